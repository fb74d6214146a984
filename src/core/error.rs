use super::service::Readiness;
use thiserror::Error;

/// Typed failures of the classification pipeline.
///
/// Functions in this crate return `anyhow::Result`; these variants can be
/// recovered with `err.downcast_ref::<ClassifierError>()`.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The model or the class labels have not finished loading.
    #[error("classifier is not ready yet (state: {0})")]
    NotReady(Readiness),

    /// Startup loading failed; the message is the underlying cause.
    #[error("classifier failed to load: {0}")]
    LoadFailed(String),

    /// The submitted bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("model produced {got} scores but {expected} class labels are loaded")]
    ClassCountMismatch { expected: usize, got: usize },

    #[error("model produced an empty score vector")]
    EmptyScores,

    #[error("predicted class id {class_id} is outside the {len} known labels")]
    LabelOutOfRange { class_id: usize, len: usize },
}
