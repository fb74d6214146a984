//! Scoped tensor lifetimes for a single inference.
//!
//! Candle tensors are reference counted, so an intermediate tensor stays alive
//! for as long as anything still holds a handle to it. A [`TensorScope`] owns a
//! handle to every intermediate tensor produced while classifying one image and
//! drops them all together when the scope ends, whichever way it ends.
//!
//! Only values implementing [`Detached`] can leave a scope through [`tidy`], so a
//! large intermediate tensor cannot be handed back to the caller by accident.
//!
//! ```rust,no_run
//! use candle_core::{Device, Tensor};
//! use mobilenet_classifier::core::tidy;
//!
//! let total: f32 = tidy("sum", |scope| {
//!     let t = scope.track(Tensor::new(&[1f32, 2., 3.], &Device::Cpu)?);
//!     let sum = scope.track(t.sum_all()?);
//!     Ok(sum.to_scalar::<f32>()?)
//! })?;
//! # anyhow::Ok(())
//! ```

use candle_core::Tensor;
use std::cell::Cell;

thread_local! {
    static LIVE_TENSORS: Cell<usize> = const { Cell::new(0) };
}

/// Number of tensors currently held by scopes on this thread.
pub fn live_tensors() -> usize {
    LIVE_TENSORS.with(|live| live.get())
}

/// Marker for plain values that may be returned out of a [`TensorScope`].
pub trait Detached {}

macro_rules! detached {
    ($($ty:ty),* $(,)?) => {
        $(impl Detached for $ty {})*
    };
}

detached!(bool, u8, u16, u32, u64, usize, i32, i64, f32, f64, String, ());

impl<T: Detached> Detached for Vec<T> {}
impl<T: Detached> Detached for Option<T> {}
impl<A: Detached, B: Detached> Detached for (A, B) {}
impl<A: Detached, B: Detached, C: Detached> Detached for (A, B, C) {}

/// Owns every intermediate tensor registered during one computation.
pub struct TensorScope {
    name: &'static str,
    tensors: Vec<Tensor>,
}

impl TensorScope {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tensors: Vec::new(),
        }
    }

    /// Register `tensor` with the scope and hand back a handle for further use.
    pub fn track(&mut self, tensor: Tensor) -> Tensor {
        LIVE_TENSORS.with(|live| live.set(live.get() + 1));
        self.tensors.push(tensor.clone());
        tensor
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Drop every tracked tensor now. Returns how many were released.
    pub fn release(&mut self) -> usize {
        let released = self.tensors.len();
        self.tensors.clear();
        LIVE_TENSORS.with(|live| live.set(live.get().saturating_sub(released)));
        released
    }
}

impl Drop for TensorScope {
    fn drop(&mut self) {
        let released = self.release();
        if released > 0 {
            tracing::trace!(scope = self.name, released, "tensor scope released");
        }
    }
}

/// Run `f` inside a fresh [`TensorScope`].
///
/// Tracked tensors are released before this returns, on success, on error and
/// during unwinding.
pub fn tidy<T, F>(name: &'static str, f: F) -> anyhow::Result<T>
where
    T: Detached,
    F: FnOnce(&mut TensorScope) -> anyhow::Result<T>,
{
    let mut scope = TensorScope::new(name);
    f(&mut scope)
}
