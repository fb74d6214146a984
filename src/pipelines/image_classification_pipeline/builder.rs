use super::model::ImageClassificationModel;
use super::pipeline::ImageClassificationPipeline;
use crate::core::{global_cache, ClassifierConfig, ModelOptions};
use crate::loaders::{ClassLabelsLoader, LabelSource};
use crate::models::implementations::mobilenet::{MobileNetV3Model, MobileNetV3Options};
use crate::pipelines::utils::{build_cache_key, DeviceRequest, DeviceSelectable};

pub struct ImageClassificationPipelineBuilder<M: ImageClassificationModel> {
    options: M::Options,
    labels: LabelSource,
    device_request: DeviceRequest,
}

impl<M: ImageClassificationModel> ImageClassificationPipelineBuilder<M> {
    pub fn new(options: M::Options) -> Self {
        Self {
            options,
            labels: LabelSource::default(),
            device_request: DeviceRequest::Auto,
        }
    }

    pub fn labels(mut self, source: LabelSource) -> Self {
        self.labels = source;
        self
    }

    pub fn labels_url(self, url: impl Into<String>) -> Self {
        self.labels(LabelSource::Url(url.into()))
    }

    /// Load the model and the class labels concurrently, then pair them.
    ///
    /// The weights are shared through the global model cache, so building a
    /// second pipeline for the same options and device skips the model load.
    pub async fn build(self) -> anyhow::Result<ImageClassificationPipeline<M>>
    where
        M: Clone + Send + Sync + 'static,
        M::Options: ModelOptions + Clone,
    {
        let device = self.device_request.resolve()?;
        let key = build_cache_key(&self.options, &device);
        tracing::info!(model = %key, "building image classification pipeline");

        let options = self.options;
        let model = global_cache().get_or_create(&key, || M::new(options, device));
        let loader = ClassLabelsLoader::new(self.labels);
        let labels = loader.load();
        let (model, labels) = tokio::try_join!(model, labels)?;

        ImageClassificationPipeline::new(model, labels)
    }
}

impl<M: ImageClassificationModel> DeviceSelectable for ImageClassificationPipelineBuilder<M> {
    fn device_request_mut(&mut self) -> &mut DeviceRequest {
        &mut self.device_request
    }
}

impl ImageClassificationPipelineBuilder<MobileNetV3Model> {
    pub fn mobilenet_v3() -> Self {
        Self::new(MobileNetV3Options::default())
    }

    /// Model, labels and device as named in a [`ClassifierConfig`].
    ///
    /// Fails only when `config.device` is not a recognised device name.
    pub fn from_config(config: &ClassifierConfig) -> anyhow::Result<Self> {
        let builder = Self::new(MobileNetV3Options::from_config(config))
            .device_request(config.device.parse()?);
        Ok(match &config.labels_path {
            Some(path) => builder.labels(LabelSource::File(path.clone())),
            None => builder.labels_url(config.labels_url.clone()),
        })
    }
}
