//! Bitmap → model input tensor.
//!
//! Pixels go through the same steps a browser classifier would apply: raw RGB
//! at native size, nearest-neighbour resize, cast to `f32`, leading batch axis.
//! No per-channel normalization happens here.

use crate::core::TensorScope;
use candle_core::{DType, Device, Tensor};
use image::DynamicImage;

/// Source index for every output position of a nearest-neighbour resize.
///
/// Output position `o` samples `floor(o * in_len / out_len)`, clamped to the
/// last source index (no half-pixel centres, no corner alignment).
pub fn nearest_indices(in_len: usize, out_len: usize) -> Vec<u32> {
    let scale = in_len as f64 / out_len as f64;
    (0..out_len)
        .map(|o| ((o as f64 * scale).floor() as usize).min(in_len.saturating_sub(1)) as u32)
        .collect()
}

/// RGB pixels at native resolution, shaped `(height, width, 3)` as `u8`.
pub fn pixels_to_tensor(image: &DynamicImage, device: &Device) -> anyhow::Result<Tensor> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("Cannot classify an empty {width}x{height} image");
    }
    let tensor = Tensor::from_vec(
        rgb.into_raw(),
        (height as usize, width as usize, 3),
        device,
    )?;
    Ok(tensor)
}

/// Nearest-neighbour resize of a `(height, width, channels)` tensor.
pub fn resize_nearest(
    scope: &mut TensorScope,
    pixels: &Tensor,
    (out_h, out_w): (usize, usize),
) -> anyhow::Result<Tensor> {
    let (in_h, in_w, _) = pixels.dims3()?;
    let device = pixels.device();

    let rows = scope.track(Tensor::from_vec(nearest_indices(in_h, out_h), out_h, device)?);
    let cols = scope.track(Tensor::from_vec(nearest_indices(in_w, out_w), out_w, device)?);

    let resized = scope.track(pixels.index_select(&rows, 0)?);
    Ok(scope.track(resized.index_select(&cols, 1)?))
}

/// Full preprocessing: `(1, height, width, 3)` `f32` pixels in `0..=255`.
pub fn image_to_input(
    scope: &mut TensorScope,
    image: &DynamicImage,
    size: (usize, usize),
    device: &Device,
) -> anyhow::Result<Tensor> {
    let pixels = scope.track(pixels_to_tensor(image, device)?);
    let resized = resize_nearest(scope, &pixels, size)?;
    let floats = scope.track(resized.to_dtype(DType::F32)?);
    Ok(scope.track(floats.unsqueeze(0)?))
}
