use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Error as E;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::core::config::{ClassifierConfig, DEFAULT_INPUT_SIZE, DEFAULT_WEIGHTS_FILE};
use crate::loaders::{ModelFilesLoader, ModelSource};
use crate::models::mobilenet_v3::{Config, MobileNetV3};
use crate::pipelines::image_classification_pipeline::ImageClassificationModel;

/// Where to load MobileNetV3-Large weights from, and at what input size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MobileNetV3Options {
    pub source: ModelSource,
    pub input_size: usize,
}

impl Default for MobileNetV3Options {
    fn default() -> Self {
        Self {
            source: ModelSource::default(),
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl MobileNetV3Options {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Dir {
                dir: dir.into(),
                weights_file: DEFAULT_WEIGHTS_FILE.to_string(),
            },
            ..Self::default()
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        let source = match &config.model_dir {
            Some(dir) => ModelSource::Dir {
                dir: dir.clone(),
                weights_file: config.weights_file.clone(),
            },
            None => ModelSource::Hub {
                repo: config.model_repo.clone(),
                weights_file: config.weights_file.clone(),
            },
        };
        Self {
            source,
            input_size: config.input_size,
        }
    }
}

impl std::fmt::Display for MobileNetV3Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mobilenetv3-large@{}-{}px", self.source, self.input_size)
    }
}

impl crate::core::ModelOptions for MobileNetV3Options {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

/// MobileNetV3-Large loaded from a safetensors artifact.
#[derive(Clone)]
pub struct MobileNetV3Model {
    network: Arc<MobileNetV3>,
    device: Device,
    input_size: usize,
}

impl MobileNetV3Model {
    pub async fn from_options(options: MobileNetV3Options, device: Device) -> anyhow::Result<Self> {
        let files = ModelFilesLoader::new(options.source.clone()).load().await?;

        let config_content = tokio::fs::read_to_string(&files.config).await.map_err(|e| {
            E::msg(format!("Failed to read config file {:?}: {e}", files.config))
        })?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| E::msg(format!("Failed to parse model config: {e}")))?;

        if files
            .weights
            .extension()
            .is_none_or(|ext| ext != "safetensors")
        {
            anyhow::bail!("Unsupported weight file format: {:?}", files.weights);
        }
        // Safety: the weights file is not modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.as_path()], DType::F32, &device)?
        };
        let network = MobileNetV3::load(vb, &config)?;

        tracing::info!(
            source = %options.source,
            classes = network.num_classes(),
            "MobileNetV3 weights loaded"
        );

        Ok(Self {
            network: Arc::new(network),
            device,
            input_size: options.input_size,
        })
    }

    /// Wrap an already constructed network.
    pub fn from_network(network: MobileNetV3, device: Device, input_size: usize) -> Self {
        Self {
            network: Arc::new(network),
            device,
            input_size,
        }
    }
}

impl ImageClassificationModel for MobileNetV3Model {
    type Options = MobileNetV3Options;

    async fn new(options: Self::Options, device: Device) -> anyhow::Result<Self> {
        Self::from_options(options, device).await
    }

    fn predict(&self, pixels: &Tensor) -> anyhow::Result<Tensor> {
        Ok(self.network.forward(pixels)?)
    }

    fn num_classes(&self) -> usize {
        self.network.num_classes()
    }

    fn input_size(&self) -> (usize, usize) {
        (self.input_size, self.input_size)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
