pub mod implementations;
pub mod mobilenet_v3;

pub use mobilenet_v3::MobileNetV3;
