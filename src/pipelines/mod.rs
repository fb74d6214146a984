pub mod image_classification_pipeline;
pub mod utils;

pub use image_classification_pipeline::*;
