//! Process-wide cache of loaded classifier weights.
//!
//! Building a second pipeline for the same model and device reuses the weights
//! that are already in memory instead of reading the artifact again.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Implemented by model option types to produce a stable cache key.
pub trait ModelOptions {
    fn cache_key(&self) -> String;
}

type CachedModel = Arc<dyn Any + Send + Sync>;
type CacheStorage = HashMap<(TypeId, String), Arc<OnceCell<CachedModel>>>;

pub struct ModelCache {
    cache: Arc<Mutex<CacheStorage>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached model for `key`, or run `loader` and cache its result.
    ///
    /// Models are stored per concrete type, so two model types may share a key.
    /// Concurrent callers for the same key wait on a single `loader` run. A
    /// failed load is not cached and the next caller tries again.
    pub async fn get_or_create<M, Fut, F>(&self, key: &str, loader: F) -> anyhow::Result<M>
    where
        M: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<M>>,
    {
        let slot = {
            let mut cache = self.cache.lock().await;
            Arc::clone(
                cache
                    .entry((TypeId::of::<M>(), key.to_string()))
                    .or_default(),
            )
        };

        if slot.initialized() {
            tracing::debug!(key, "model cache hit");
        }
        let model = slot
            .get_or_try_init(move || async move {
                tracing::debug!(key, "model cache miss, loading");
                let model = loader().await?;
                anyhow::Ok(Arc::new(model) as CachedModel)
            })
            .await?;

        model
            .downcast_ref::<M>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Cached model for {key} has an unexpected type"))
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    /// Number of loaded models. Keys whose load failed or is in flight are not counted.
    pub async fn len(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_MODEL_CACHE: once_cell::sync::Lazy<ModelCache> =
    once_cell::sync::Lazy::new(ModelCache::new);

pub fn global_cache() -> &'static ModelCache {
    &GLOBAL_MODEL_CACHE
}
