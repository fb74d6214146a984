pub mod mobilenet;

pub use mobilenet::{MobileNetV3Model, MobileNetV3Options};
