pub mod core;
pub mod loaders;
pub mod models;
pub mod pipelines;
pub mod session;

// Re-export core types
pub use core::{ClassifierConfig, ClassifierError, Readiness};

// Re-export the pipeline surface for easier access
pub use pipelines::image_classification_pipeline::{
    global_classifier, ClassLabels, ClassifierService, ImageClassificationModel,
    ImageClassificationPipeline, ImageClassificationPipelineBuilder, Prediction,
};

pub use models::implementations::{MobileNetV3Model, MobileNetV3Options};
pub use session::{ClassifierSession, DropRejection, DropZone, SubmittedFile, UiState};
