//! Two-phase lifecycle for a value that is loaded once and then shared.
//!
//! A [`ServiceCell`] starts out [`Readiness::Uninitialized`], moves to
//! [`Readiness::Loading`] while its loader runs and ends up either
//! [`Readiness::Ready`] or [`Readiness::Failed`]. Callers that need the value
//! ask for it with [`ServiceCell::get`] and receive an explicit
//! [`ClassifierError::NotReady`] instead of a missing collaborator.

use super::error::ClassifierError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Readiness::Uninitialized => "uninitialized",
            Readiness::Loading => "loading",
            Readiness::Ready => "ready",
            Readiness::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

enum State<T> {
    Uninitialized,
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

impl<T> State<T> {
    fn readiness(&self) -> Readiness {
        match self {
            State::Uninitialized => Readiness::Uninitialized,
            State::Loading => Readiness::Loading,
            State::Ready(_) => Readiness::Ready,
            State::Failed(_) => Readiness::Failed,
        }
    }
}

pub struct ServiceCell<T> {
    state: RwLock<State<T>>,
    notify: watch::Sender<Readiness>,
}

impl<T> ServiceCell<T> {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(Readiness::Uninitialized);
        Self {
            state: RwLock::new(State::Uninitialized),
            notify,
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// The loaded value, or [`ClassifierError::NotReady`] while it is not.
    pub fn get(&self) -> anyhow::Result<Arc<T>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Ready(value) => Ok(Arc::clone(value)),
            other => Err(ClassifierError::NotReady(other.readiness()).into()),
        }
    }

    /// Why the last load failed, if it did.
    pub fn failure(&self) -> Option<String> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Run `loader` and store its output.
    ///
    /// Only an uninitialized or failed cell starts loading. Calling this while
    /// another load is in flight returns `NotReady(Loading)`; calling it on a
    /// ready cell returns the existing value without running `loader`.
    pub async fn start<F>(&self, loader: F) -> anyhow::Result<Arc<T>>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match &*state {
                State::Ready(value) => return Ok(Arc::clone(value)),
                State::Loading => return Err(ClassifierError::NotReady(Readiness::Loading).into()),
                State::Uninitialized | State::Failed(_) => *state = State::Loading,
            }
        }
        self.notify.send_replace(Readiness::Loading);

        match loader.await {
            Ok(value) => {
                let value = Arc::new(value);
                *self.state.write().unwrap_or_else(PoisonError::into_inner) =
                    State::Ready(Arc::clone(&value));
                self.notify.send_replace(Readiness::Ready);
                tracing::info!("classifier ready");
                Ok(value)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::error!(error = %reason, "classifier failed to load");
                *self.state.write().unwrap_or_else(PoisonError::into_inner) =
                    State::Failed(reason.clone());
                self.notify.send_replace(Readiness::Failed);
                Err(e.context(ClassifierError::LoadFailed(reason)))
            }
        }
    }

    /// Wait until loading settles, then behave like [`ServiceCell::get`].
    pub async fn wait_ready(&self) -> anyhow::Result<Arc<T>> {
        let mut changes = self.notify.subscribe();
        loop {
            match self.readiness() {
                Readiness::Ready => return self.get(),
                Readiness::Failed => {
                    let reason = self.failure().unwrap_or_default();
                    return Err(ClassifierError::LoadFailed(reason).into());
                }
                Readiness::Uninitialized | Readiness::Loading => {}
            }
            if changes.changed().await.is_err() {
                return self.get();
            }
        }
    }

    /// Subscribe to lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.notify.subscribe()
    }
}

impl<T> Default for ServiceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn get_is_not_ready_before_start() {
        let cell: ServiceCell<u32> = ServiceCell::new();
        let err = cell.get().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClassifierError>(),
            Some(ClassifierError::NotReady(Readiness::Uninitialized))
        ));
    }

    #[tokio::test]
    async fn start_moves_to_ready() -> anyhow::Result<()> {
        let cell = ServiceCell::new();
        let value = cell.start(async { Ok(7u32) }).await?;
        assert_eq!(*value, 7);
        assert_eq!(cell.readiness(), Readiness::Ready);
        assert_eq!(*cell.get()?, 7);

        // A second start keeps the loaded value.
        let again = cell.start(async { Ok(9u32) }).await?;
        assert_eq!(*again, 7);
        Ok(())
    }

    #[tokio::test]
    async fn failed_load_is_reported_and_can_be_retried() -> anyhow::Result<()> {
        let cell: ServiceCell<u32> = ServiceCell::new();
        let err = cell
            .start(async { Err(anyhow::anyhow!("labels unreachable")) })
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("labels unreachable"));
        assert_eq!(cell.readiness(), Readiness::Failed);
        assert_eq!(cell.failure().as_deref(), Some("labels unreachable"));
        assert!(cell.wait_ready().await.is_err());

        cell.start(async { Ok(1u32) }).await?;
        assert!(cell.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn wait_ready_resolves_once_loading_completes() -> anyhow::Result<()> {
        let cell = Arc::new(ServiceCell::new());
        let loader = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                cell.start(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(42u32)
                })
                .await
            })
        };

        let value = tokio::time::timeout(Duration::from_secs(5), cell.wait_ready()).await??;
        assert_eq!(*value, 42);
        loader.await??;
        Ok(())
    }
}
