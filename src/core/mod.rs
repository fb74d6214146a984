pub mod cache;
pub mod config;
pub mod error;
pub mod scope;
pub mod service;

pub use cache::{global_cache, ModelCache, ModelOptions};
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use scope::{live_tensors, tidy, Detached, TensorScope};
pub use service::{Readiness, ServiceCell};
