//! Loaders for the two startup artifacts: model files and class labels.
//!
//! ## Main Types
//!
//! - [`HfLoader`] - Downloads one file from a Hugging Face Hub repo, with retry logic
//! - [`ModelFilesLoader`] - Locates `config.json` and the weights, on the hub or on disk
//! - [`ClassLabelsLoader`] - Fetches the ordered class-name list
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use mobilenet_classifier::loaders::{ClassLabelsLoader, LabelSource};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let labels = ClassLabelsLoader::new(LabelSource::default()).load().await?;
//! println!("{} classes", labels.len());
//! # Ok(())
//! # }
//! ```

use crate::core::config::{DEFAULT_LABELS_URL, DEFAULT_MODEL_REPO, DEFAULT_WEIGHTS_FILE};
use crate::pipelines::image_classification_pipeline::ClassLabels;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub async fn load(&self) -> anyhow::Result<PathBuf> {
        let hf_api = hf_hub::api::tokio::ApiBuilder::new()
            .with_chunk_size(None)
            .build()?;
        let hf_api = hf_api.model(self.repo.clone());

        // Concurrent downloads of the same repo can race on the cache lock.
        let max_retries = 3;
        let mut attempt = 0;
        loop {
            match hf_api.get(self.filename.as_str()).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("Lock acquisition failed") && attempt < max_retries - 1 {
                        let wait_time = std::time::Duration::from_millis(100 * (1 << attempt));
                        tracing::warn!(
                            repo = %self.repo,
                            file = %self.filename,
                            attempt,
                            "hub lock busy, retrying"
                        );
                        tokio::time::sleep(wait_time).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(anyhow::anyhow!(
                        "Failed to fetch {} from {}: {e}",
                        self.filename,
                        self.repo
                    ));
                }
            }
        }
    }
}

/// Where the packaged model artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelSource {
    Hub { repo: String, weights_file: String },
    /// A local directory holding `config.json` and `weights_file`.
    Dir { dir: PathBuf, weights_file: String },
}

impl Default for ModelSource {
    fn default() -> Self {
        ModelSource::Hub {
            repo: DEFAULT_MODEL_REPO.to_string(),
            weights_file: DEFAULT_WEIGHTS_FILE.to_string(),
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSource::Hub { repo, weights_file } => write!(f, "hf:{repo}/{weights_file}"),
            ModelSource::Dir { dir, weights_file } => {
                write!(f, "dir:{}/{weights_file}", dir.display())
            }
        }
    }
}

/// Paths of a downloaded or local model artifact.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub weights: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelFilesLoader {
    pub source: ModelSource,
}

impl ModelFilesLoader {
    pub fn new(source: ModelSource) -> Self {
        Self { source }
    }

    pub async fn load(&self) -> anyhow::Result<ModelFiles> {
        match &self.source {
            ModelSource::Hub { repo, weights_file } => {
                let config = HfLoader::new(repo, "config.json").load().await?;
                let weights = HfLoader::new(repo, weights_file).load().await?;
                Ok(ModelFiles { config, weights })
            }
            ModelSource::Dir { dir, weights_file } => {
                let config = existing_file(dir, "config.json")?;
                let weights = existing_file(dir, weights_file)?;
                Ok(ModelFiles { config, weights })
            }
        }
    }
}

fn existing_file(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    if !path.is_file() {
        anyhow::bail!("Model artifact is missing {name} in {}", dir.display());
    }
    Ok(path)
}

/// Where the class-name list comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSource {
    /// A JSON array of strings served over HTTP(S).
    Url(String),
    /// A JSON array of strings on disk.
    File(PathBuf),
    Inline(Vec<String>),
}

impl Default for LabelSource {
    fn default() -> Self {
        LabelSource::Url(DEFAULT_LABELS_URL.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ClassLabelsLoader {
    pub source: LabelSource,
}

impl ClassLabelsLoader {
    pub fn new(source: LabelSource) -> Self {
        Self { source }
    }

    pub async fn load(&self) -> anyhow::Result<ClassLabels> {
        let labels = match &self.source {
            LabelSource::Url(url) => {
                tracing::info!(%url, "fetching class labels");
                let names: Vec<String> = reqwest::get(url.as_str())
                    .await?
                    .error_for_status()?
                    .json()
                    .await
                    .map_err(|e| anyhow::anyhow!("Class labels at {url} are not a JSON string array: {e}"))?;
                ClassLabels::new(names)
            }
            LabelSource::File(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to read labels file {path:?}: {e}"))?;
                ClassLabels::from_json(&content)?
            }
            LabelSource::Inline(names) => ClassLabels::new(names.clone()),
        };

        if labels.is_empty() {
            anyhow::bail!("Class label list is empty");
        }
        tracing::debug!(count = labels.len(), "class labels loaded");
        Ok(labels)
    }
}
