use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// ImageNet class names, one per model output, in class-id order.
pub const DEFAULT_LABELS_URL: &str =
    "https://raw.githubusercontent.com/anishathalye/imagenet-simple-labels/master/imagenet-simple-labels.json";
pub const DEFAULT_MODEL_REPO: &str = "timm/mobilenetv3_large_100.ra_in1k";
pub const DEFAULT_WEIGHTS_FILE: &str = "model.safetensors";
pub const DEFAULT_INPUT_SIZE: usize = 224;
/// Largest accepted upload, in bytes.
pub const MAX_FILE_SIZE: u64 = 10_000_000;
pub const FILES_LIMIT: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub labels_url: String,
    /// Read labels from a local JSON array instead of `labels_url`.
    pub labels_path: Option<PathBuf>,
    pub model_repo: String,
    pub weights_file: String,
    /// Directory holding `config.json` and the weights; overrides `model_repo`.
    pub model_dir: Option<PathBuf>,
    pub input_size: usize,
    pub max_file_size: u64,
    pub files_limit: usize,
    /// `auto`, `cpu`, `cuda` or `cuda:<index>`.
    pub device: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            labels_url: DEFAULT_LABELS_URL.to_string(),
            labels_path: None,
            model_repo: DEFAULT_MODEL_REPO.to_string(),
            weights_file: DEFAULT_WEIGHTS_FILE.to_string(),
            model_dir: None,
            input_size: DEFAULT_INPUT_SIZE,
            max_file_size: MAX_FILE_SIZE,
            files_limit: FILES_LIMIT,
            device: "auto".to_string(),
        }
    }
}

impl ClassifierConfig {
    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse classifier config: {e}"))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {path:?}: {e}"))?;
        Self::from_json_str(&content)
    }
}
