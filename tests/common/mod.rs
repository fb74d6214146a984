#![allow(dead_code)]

use candle_core::{Device, Tensor};
use mobilenet_classifier::core::ModelOptions;
use mobilenet_classifier::session::UiState;
use mobilenet_classifier::ImageClassificationModel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Scores handed to [`FixedScores`].
#[derive(Debug, Clone)]
pub struct ScoresOptions(pub Vec<f32>);

impl ModelOptions for ScoresOptions {
    fn cache_key(&self) -> String {
        format!("fixed-scores-{:?}", self.0)
    }
}

/// Returns the same scores for every image.
#[derive(Clone)]
pub struct FixedScores {
    pub scores: Vec<f32>,
    pub device: Device,
    /// Blocks inside `predict` for this long.
    pub delay: Option<Duration>,
    /// Records whether the screen showed the loading overlay during `predict`.
    pub screen: Option<(watch::Receiver<UiState>, Arc<AtomicBool>)>,
}

impl FixedScores {
    pub fn new(scores: &[f32]) -> Self {
        Self {
            scores: scores.to_vec(),
            device: Device::Cpu,
            delay: None,
            screen: None,
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn watching(mut self, screen: watch::Receiver<UiState>) -> (Self, Arc<AtomicBool>) {
        let seen = Arc::new(AtomicBool::new(false));
        self.screen = Some((screen, Arc::clone(&seen)));
        (self, seen)
    }
}

impl ImageClassificationModel for FixedScores {
    type Options = ScoresOptions;

    async fn new(options: ScoresOptions, device: Device) -> anyhow::Result<Self> {
        Ok(Self {
            device,
            ..Self::new(&options.0)
        })
    }

    fn predict(&self, pixels: &Tensor) -> anyhow::Result<Tensor> {
        assert_eq!(pixels.dims(), &[1, 224, 224, 3]);
        if let Some((screen, seen)) = &self.screen {
            seen.store(screen.borrow().loading, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(Tensor::from_vec(
            self.scores.clone(),
            (1, self.scores.len()),
            &self.device,
        )?)
    }

    fn num_classes(&self) -> usize {
        self.scores.len()
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

pub fn encoded_image(format: image::ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, format)
        .expect("encode test image");
    out.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encoded_image(image::ImageFormat::Png, width, height)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
