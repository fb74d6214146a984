use candle_core::{Device, Tensor};

/// A pretrained classifier usable by [`super::ImageClassificationPipeline`].
///
/// `predict` receives raw pixels shaped `(1, height, width, 3)` as `f32` values in
/// `0..=255` and returns one score per class, shaped `(1, num_classes)`. Any
/// normalization the network needs is its own business.
#[allow(async_fn_in_trait)]
pub trait ImageClassificationModel {
    type Options: std::fmt::Debug + Clone;

    async fn new(options: Self::Options, device: Device) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn predict(&self, pixels: &Tensor) -> anyhow::Result<Tensor>;

    fn num_classes(&self) -> usize;

    /// Spatial input size as `(height, width)`.
    fn input_size(&self) -> (usize, usize) {
        (224, 224)
    }

    fn device(&self) -> &Device;
}
