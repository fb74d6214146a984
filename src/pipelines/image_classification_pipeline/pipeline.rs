use super::decoder::{decode_image, read_image_file};
use super::labels::ClassLabels;
use super::model::ImageClassificationModel;
use super::preprocess::image_to_input;
use crate::core::{tidy, ClassifierError, Detached};
use candle_core::{DType, D};
use image::DynamicImage;
use std::path::Path;

/// The top-1 class for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// `round(score * 100)`, clamped to `0..=100`.
    pub confidence: u8,
    pub class_id: usize,
    pub score: f32,
}

impl Detached for Prediction {}

/// Converts a class score to a whole percentage.
///
/// The product is taken in `f64`: an `f32` multiply can round a score such as
/// `0.005` (really `0.00499999...`) up onto an exact `.5`.
pub fn confidence_percent(score: f32) -> u8 {
    (f64::from(score) * 100.0).round().clamp(0.0, 100.0) as u8
}

pub struct ImageClassificationPipeline<M: ImageClassificationModel> {
    pub(crate) model: M,
    pub(crate) labels: ClassLabels,
}

impl<M: ImageClassificationModel> ImageClassificationPipeline<M> {
    /// Pair a loaded model with its labels. Both must agree on the class count.
    pub fn new(model: M, labels: ClassLabels) -> anyhow::Result<Self> {
        if model.num_classes() != labels.len() {
            return Err(ClassifierError::ClassCountMismatch {
                expected: labels.len(),
                got: model.num_classes(),
            }
            .into());
        }
        Ok(Self { model, labels })
    }

    /// Classify a decoded image.
    pub fn predict(&self, image: &DynamicImage) -> anyhow::Result<Prediction> {
        let (class_id, score) = tidy("image-classification", |scope| {
            let input = image_to_input(scope, image, self.model.input_size(), self.model.device())?;
            let output = scope.track(self.model.predict(&input)?);
            let scores = scope.track(output.flatten_all()?.to_dtype(DType::F32)?);

            let num_scores = scores.elem_count();
            if num_scores == 0 {
                return Err(ClassifierError::EmptyScores.into());
            }
            if num_scores != self.labels.len() {
                return Err(ClassifierError::ClassCountMismatch {
                    expected: self.labels.len(),
                    got: num_scores,
                }
                .into());
            }

            let best = scope.track(scores.argmax(D::Minus1)?);
            let class_id = best.to_scalar::<u32>()? as usize;
            let score = scope.track(scores.get(class_id)?).to_scalar::<f32>()?;
            Ok((class_id, score))
        })?;

        let label = self
            .labels
            .get(class_id)
            .ok_or(ClassifierError::LabelOutOfRange {
                class_id,
                len: self.labels.len(),
            })?;

        let prediction = Prediction {
            label: label.to_string(),
            confidence: confidence_percent(score),
            class_id,
            score,
        };
        tracing::debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            class_id,
            "image classified"
        );
        Ok(prediction)
    }

    /// Decode `bytes` and classify the result.
    pub fn predict_bytes(&self, bytes: &[u8]) -> anyhow::Result<Prediction> {
        let image = decode_image(bytes)?;
        self.predict(&image)
    }

    pub async fn predict_file(&self, path: impl AsRef<Path>) -> anyhow::Result<Prediction> {
        let bytes = read_image_file(path).await?;
        self.predict_bytes(&bytes)
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::live_tensors;
    use candle_core::{Device, Tensor};
    use image::{Rgb, RgbImage};

    #[derive(Clone)]
    struct FixedScores {
        scores: Vec<f32>,
        device: Device,
    }

    impl ImageClassificationModel for FixedScores {
        type Options = Vec<f32>;

        async fn new(scores: Vec<f32>, device: Device) -> anyhow::Result<Self> {
            Ok(Self { scores, device })
        }

        fn predict(&self, pixels: &Tensor) -> anyhow::Result<Tensor> {
            assert_eq!(pixels.dims(), &[1, 224, 224, 3]);
            Ok(Tensor::from_vec(self.scores.clone(), (1, self.scores.len()), &self.device)?)
        }

        fn num_classes(&self) -> usize {
            self.scores.len()
        }

        fn device(&self) -> &Device {
            &self.device
        }
    }

    fn pipeline(scores: &[f32], labels: &[&str]) -> ImageClassificationPipeline<FixedScores> {
        let model = FixedScores {
            scores: scores.to_vec(),
            device: Device::Cpu,
        };
        ImageClassificationPipeline::new(model, labels.iter().copied().collect()).unwrap()
    }

    fn photo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([90, 60, 30])))
    }

    #[test]
    fn confidence_rounds_to_nearest_percent() {
        assert_eq!(confidence_percent(0.5), 50);
        assert_eq!(confidence_percent(0.004), 0);
        assert_eq!(confidence_percent(0.999), 100);
        assert_eq!(confidence_percent(1.7), 100);
        assert_eq!(confidence_percent(-0.2), 0);
    }

    #[test]
    fn confidence_does_not_round_up_below_half_percent_boundaries() {
        assert_eq!(confidence_percent(0.005), 0);
        assert_eq!(confidence_percent(0.015), 1);
        assert_eq!(confidence_percent(0.055), 5);
        assert_eq!(confidence_percent(0.065), 6);
    }

    #[test]
    fn picks_the_highest_scoring_label() -> anyhow::Result<()> {
        let pipeline = pipeline(&[0.1, 0.8, 0.1], &["cat", "dog", "bird"]);
        let prediction = pipeline.predict(&photo())?;
        assert_eq!(prediction.label, "dog");
        assert_eq!(prediction.confidence, 80);
        assert_eq!(prediction.class_id, 1);
        Ok(())
    }

    #[test]
    fn intermediate_tensors_are_released() -> anyhow::Result<()> {
        let pipeline = pipeline(&[0.3, 0.7], &["left", "right"]);
        let before = live_tensors();
        pipeline.predict(&photo())?;
        assert_eq!(live_tensors(), before);
        Ok(())
    }

    #[test]
    fn mismatched_label_count_is_rejected() {
        let model = FixedScores {
            scores: vec![0.5, 0.5],
            device: Device::Cpu,
        };
        let labels: ClassLabels = ["only one"].into_iter().collect();
        let err = ImageClassificationPipeline::new(model, labels).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ClassifierError>(),
            Some(ClassifierError::ClassCountMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn undecodable_bytes_never_reach_the_model() {
        let pipeline = pipeline(&[1.0], &["anything"]);
        let err = pipeline.predict_bytes(b"GIF89a but not really").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClassifierError>(),
            Some(ClassifierError::Decode(_))
        ));
    }
}
