//! Lazily-initialized model handles.
//!
//! Loading or connecting to a model is the expensive part of a cold start,
//! so each pipeline holds a [`ModelHandle`] that builds its model on first
//! use and reuses it for the life of the process. Concurrent first callers
//! wait on a single initialization.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::providers::ProviderError;
use crate::RuntimeError;

type InitFuture<T> = Pin<Box<dyn Future<Output = Result<Arc<T>, ProviderError>> + Send>>;
type InitFn<T> = Box<dyn Fn() -> InitFuture<T> + Send + Sync>;

/// Init-once-on-demand wrapper around a model.
///
/// `T` is usually a trait object such as `dyn ZeroShotClassifier`.
pub struct ModelHandle<T: ?Sized> {
    name: String,
    cell: OnceCell<Arc<T>>,
    init: InitFn<T>,
}

impl<T: ?Sized + Send + Sync + 'static> ModelHandle<T> {
    /// A handle that runs `init` the first time the model is needed.
    pub fn lazy<F, Fut>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, ProviderError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
            init: Box::new(move || -> InitFuture<T> { Box::pin(init()) }),
        }
    }

    /// A handle around an already-constructed model.
    pub fn ready(name: impl Into<String>, model: Arc<T>) -> Self {
        let name = name.into();
        let missing = name.clone();
        Self {
            name,
            cell: OnceCell::new_with(Some(model)),
            init: Box::new(move || -> InitFuture<T> {
                let missing = missing.clone();
                Box::pin(async move {
                    Err(ProviderError::NotConfigured(format!("{} has no initializer", missing)))
                })
            }),
        }
    }

    /// The model, initializing it on first call.
    ///
    /// A failed initialization is reported as [`RuntimeError::ModelInit`].
    /// The handle stays empty, so the caller decides whether to try again.
    pub async fn get(&self) -> Result<Arc<T>, RuntimeError> {
        let model = self
            .cell
            .get_or_try_init(|| {
                tracing::info!(model = %self.name, "Initializing model");
                (self.init)()
            })
            .await
            .map_err(|e| {
                tracing::error!(model = %self.name, error = %e, "Model initialization failed");
                RuntimeError::ModelInit(format!("{}: {}", self.name, e))
            })?;

        Ok(Arc::clone(model))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T: ?Sized> fmt::Debug for ModelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Model: Send + Sync {
        fn id(&self) -> u32;
    }

    struct Fixed(u32);

    impl Model for Fixed {
        fn id(&self) -> u32 {
            self.0
        }
    }

    #[tokio::test]
    async fn test_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle: ModelHandle<dyn Model> = ModelHandle::lazy("fixed", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(Arc::new(Fixed(7)) as Arc<dyn Model>)
            }
        });

        assert!(!handle.is_initialized());
        let (a, b) = tokio::join!(handle.get(), handle.get());
        assert_eq!(a.unwrap().id(), 7);
        assert_eq!(b.unwrap().id(), 7);
        assert_eq!(handle.get().await.unwrap().id(), 7);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_initialized());
    }

    #[tokio::test]
    async fn test_init_failure_is_model_init() {
        let handle: ModelHandle<dyn Model> = ModelHandle::lazy("broken", || async {
            Err::<Arc<dyn Model>, _>(ProviderError::NotConfigured("weights missing".into()))
        });

        let err = handle.get().await.err().unwrap();
        assert!(matches!(err, RuntimeError::ModelInit(_)));
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("weights missing"));
        assert!(!handle.is_initialized());
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let handle: ModelHandle<dyn Model> = ModelHandle::ready("fixed", Arc::new(Fixed(3)));
        assert!(handle.is_initialized());
        assert_eq!(handle.get().await.unwrap().id(), 3);
        assert_eq!(handle.name(), "fixed");
    }
}
