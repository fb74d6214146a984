//! The user-facing side of the classifier.
//!
//! A [`ClassifierSession`] owns what a front end shows: a loading flag for the
//! blocking spinner overlay, the current [`Prediction`] rendered as two chips,
//! and an alert for rejected uploads. Front ends call
//! [`ClassifierSession::submit`] whenever the drop target's file list changes
//! and redraw from [`ClassifierSession::subscribe`].
//!
//! Only input-validation problems become an on-screen alert. Inference errors
//! are returned to the caller and logged, and the loading flag is always reset.

use crate::core::ClassifierConfig;
use crate::pipelines::image_classification_pipeline::{
    read_image_file, ClassifierService, ImageClassificationModel, Prediction,
};
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;

/// A file handed over by the drop target.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// MIME type reported by the source, if any.
    pub mime_type: Option<String>,
}

impl SubmittedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = read_image_file(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = Self::new(name, bytes);
        Ok(match image::ImageFormat::from_path(path) {
            Ok(format) => file.with_mime_type(format.to_mime_type()),
            Err(_) => file,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `image/*` by declared type, or by content when no type was declared.
    pub fn is_image(&self) -> bool {
        match &self.mime_type {
            Some(mime) => mime.starts_with("image/"),
            None => image::guess_format(&self.bytes).is_ok(),
        }
    }
}

/// Why the drop target refused a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropRejection {
    #[error("Maximum allowed number of files exceeded. Only {limit} allowed")]
    TooManyFiles { limit: usize, got: usize },

    #[error("File {name} is too big. Size limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("File {name} was rejected. File type not supported")]
    NotAnImage { name: String },
}

/// Upload constraints of the drop target: `image/*` only, size and count limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropZone {
    pub max_file_size: u64,
    pub files_limit: usize,
}

impl Default for DropZone {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

impl DropZone {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            files_limit: config.files_limit,
        }
    }

    pub fn validate(&self, files: &[SubmittedFile]) -> Result<(), DropRejection> {
        if files.len() > self.files_limit {
            return Err(DropRejection::TooManyFiles {
                limit: self.files_limit,
                got: files.len(),
            });
        }
        for file in files {
            if !file.is_image() {
                return Err(DropRejection::NotAnImage {
                    name: file.name.clone(),
                });
            }
            if file.size() > self.max_file_size {
                return Err(DropRejection::FileTooLarge {
                    name: file.name.clone(),
                    size: file.size(),
                    limit: self.max_file_size,
                });
            }
        }
        Ok(())
    }
}

/// What the screen shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub loading: bool,
    pub prediction: Option<Prediction>,
    pub alert: Option<String>,
}

impl UiState {
    pub fn prediction_chip(&self) -> String {
        match &self.prediction {
            Some(p) => format!("Prediction: {}", p.label),
            None => "Prediction:".to_string(),
        }
    }

    pub fn confidence_chip(&self) -> String {
        match &self.prediction {
            Some(p) => format!("Confidence: {}%", p.confidence),
            None => "Confidence:".to_string(),
        }
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(alert) = &self.alert {
            out.push_str(&format!("! {alert}\n"));
        }
        if self.loading {
            out.push_str("[ classifying... ]\n");
        }
        out.push_str(&format!(
            "[ {} ]  [ {} ]",
            self.prediction_chip(),
            self.confidence_chip()
        ));
        out
    }
}

/// Resets the loading flag however the submission ends, including cancellation.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<UiState>,
}

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a watch::Sender<UiState>) -> Self {
        state.send_modify(|s| s.loading = true);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.loading = false);
    }
}

pub struct ClassifierSession<'a, M: ImageClassificationModel> {
    service: &'a ClassifierService<M>,
    drop_zone: DropZone,
    state: watch::Sender<UiState>,
}

impl<'a, M> ClassifierSession<'a, M>
where
    M: ImageClassificationModel + Send + Sync + 'static,
{
    pub fn new(service: &'a ClassifierService<M>, drop_zone: DropZone) -> Self {
        let (state, _) = watch::channel(UiState::default());
        Self {
            service,
            drop_zone,
            state,
        }
    }

    pub fn state(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    pub fn drop_zone(&self) -> &DropZone {
        &self.drop_zone
    }

    /// Entry point for every change of the drop target's file list.
    ///
    /// - rejected input: alert shown, error returned, prediction kept
    /// - no files: prediction cleared
    /// - one file: classified while the loading flag is up
    ///
    /// A classifier that has not finished loading yields
    /// `ClassifierError::NotReady` without touching the screen state.
    pub async fn submit(&self, files: Vec<SubmittedFile>) -> anyhow::Result<Option<Prediction>> {
        if let Err(rejection) = self.drop_zone.validate(&files) {
            tracing::warn!(%rejection, "submission rejected");
            self.state
                .send_modify(|s| s.alert = Some(rejection.to_string()));
            return Err(rejection.into());
        }

        let Some(file) = files.into_iter().next() else {
            self.state.send_modify(|s| {
                s.prediction = None;
                s.alert = None;
            });
            return Ok(None);
        };

        let pipeline = self.service.get()?;
        self.state.send_modify(|s| s.alert = None);

        let _loading = LoadingGuard::start(&self.state);
        let name = file.name.clone();
        let outcome = tokio::task::spawn_blocking(move || pipeline.predict_bytes(&file.bytes))
            .await
            .map_err(|e| anyhow::anyhow!("classification task failed: {e}"))
            .and_then(|result| result);

        match outcome {
            Ok(prediction) => {
                tracing::info!(
                    file = %name,
                    label = %prediction.label,
                    confidence = prediction.confidence,
                    "prediction ready"
                );
                self.state
                    .send_modify(|s| s.prediction = Some(prediction.clone()));
                Ok(Some(prediction))
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "classification failed");
                self.state.send_modify(|s| s.prediction = None);
                Err(e)
            }
        }
    }

    /// Convenience for a single path on disk.
    pub async fn submit_path(&self, path: impl AsRef<Path>) -> anyhow::Result<Option<Prediction>> {
        let file = SubmittedFile::from_path(path).await?;
        self.submit(vec![file]).await
    }
}
