//! # Delivery context
//!
//! Every user-facing callback (progress, completion, aggregate events,
//! export results) runs on one designated thread, the way a UI toolkit
//! requires callbacks on its main thread. Work coming from Tokio tasks is
//! queued here in FIFO order, so two callbacks enqueued by the same task
//! always run in the order they were enqueued.
//!
//! ```rust
//! use cirrus_core::DeliveryContext;
//!
//! # #[tokio::main]
//! # async fn main() -> cirrus_core::MediaResult<()> {
//! let ui = DeliveryContext::spawn("ui")?;
//! assert!(!ui.is_current());
//!
//! let on_ui = ui.run({
//!     let ui = ui.clone();
//!     move || ui.is_current()
//! }).await?;
//! assert!(on_ui);
//! # Ok(())
//! # }
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::{MediaError, MediaResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    name: String,
    tx: mpsc::UnboundedSender<Task>,
    thread: ThreadId,
}

/// Handle to the designated callback thread. Cheap to clone.
///
/// The thread exits once every handle has been dropped and the queue is
/// drained.
#[derive(Clone)]
pub struct DeliveryContext {
    inner: Arc<Inner>,
}

impl DeliveryContext {
    /// Start a new context on a dedicated, named OS thread
    pub fn spawn<S: Into<String>>(name: S) -> MediaResult<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("cirrus-{name}"))
            .spawn(move || {
                debug!(context = %thread_name, "delivery context started");
                while let Some(task) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(context = %thread_name, "callback panicked on delivery context");
                    }
                }
                debug!(context = %thread_name, "delivery context stopped");
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                tx,
                thread: handle.thread().id(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when called from the context's own thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread
    }

    /// Fail with a precondition violation unless running on this context
    pub fn ensure_current(&self, operation: &'static str) -> MediaResult<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(MediaError::precondition(
                operation,
                format!("must be called on the '{}' delivery context", self.inner.name),
            ))
        }
    }

    /// Queue `f` without waiting for it
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.tx.send(Box::new(f)).is_err() {
            warn!(context = %self.inner.name, "delivery context closed, callback dropped");
        }
    }

    /// Run `f` on the context and wait for its return value
    pub async fn run<F, R>(&self, f: F) -> MediaResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = tx.send(f());
        });
        rx.await.map_err(|_| MediaError::ContextClosed {
            name: self.inner.name.clone(),
        })
    }
}

impl std::fmt::Debug for DeliveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryContext")
            .field("name", &self.inner.name)
            .field("thread", &self.inner.thread)
            .finish()
    }
}
