//! Image classification pipeline: one picture in, one labelled prediction out.
//!
//! ## Main Types
//!
//! - [`ImageClassificationPipeline`] - Decodes, preprocesses and classifies images
//! - [`ImageClassificationPipelineBuilder`] - Loads model and labels concurrently
//! - [`ImageClassificationModel`] - Trait for classifier implementations
//! - [`ClassifierService`] - Readiness-aware holder for a pipeline that is still loading
//! - [`Prediction`] - Label, integer confidence and raw score of the top class
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use mobilenet_classifier::pipelines::image_classification_pipeline::*;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let pipeline = ImageClassificationPipelineBuilder::mobilenet_v3()
//!     .build()
//!     .await?;
//!
//! let prediction = pipeline.predict_file("cat.jpg").await?;
//! println!("Prediction: {} ({}%)", prediction.label, prediction.confidence);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod decoder;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod preprocess;

pub use builder::ImageClassificationPipelineBuilder;
pub use decoder::{decode_data_uri, decode_image, read_image_file, to_data_uri};
pub use labels::ClassLabels;
pub use model::ImageClassificationModel;
pub use pipeline::{confidence_percent, ImageClassificationPipeline, Prediction};

pub use crate::core::{ClassifierError, Readiness};
pub use crate::loaders::LabelSource;
pub use crate::models::implementations::mobilenet::{MobileNetV3Model, MobileNetV3Options};
pub use crate::pipelines::utils::DeviceSelectable;

use crate::core::ServiceCell;

/// A pipeline behind an explicit `uninitialized → loading → ready` lifecycle.
pub type ClassifierService<M = MobileNetV3Model> = ServiceCell<ImageClassificationPipeline<M>>;

static GLOBAL_CLASSIFIER: once_cell::sync::Lazy<ClassifierService> =
    once_cell::sync::Lazy::new(ServiceCell::new);

/// The process-wide MobileNetV3 classifier.
///
/// Starts uninitialized; call `start` with a builder's `build()` future once.
pub fn global_classifier() -> &'static ClassifierService {
    &GLOBAL_CLASSIFIER
}
