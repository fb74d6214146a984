//! Uploaded bytes → decoded bitmap at native resolution.

use crate::core::ClassifierError;
use base64::Engine as _;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Decode an image, guessing its format from the leading bytes.
pub fn decode_image(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ClassifierError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ClassifierError::Decode("unrecognized image format".into()).into());
    }
    let image = reader
        .decode()
        .map_err(|e| ClassifierError::Decode(e.to_string()))?;
    tracing::debug!(width = image.width(), height = image.height(), "image decoded");
    Ok(image)
}

/// Decode a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<DynamicImage> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| ClassifierError::Decode("not a data URI".into()))?;
    if !header.ends_with(";base64") {
        return Err(ClassifierError::Decode("data URI is not base64 encoded".into()).into());
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ClassifierError::Decode(format!("invalid base64 payload: {e}")))?;
    decode_image(&bytes)
}

/// Encode raw file bytes as a `data:` URI.
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{payload}")
}

pub async fn read_image_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read image file {path:?}: {e}"))
}
