//! Bounded event daemon.
//!
//! A [`Daemon`] owns a bounded queue and a worker task that hands each
//! accepted payload to a handler function, one at a time, in submission
//! order. The worker stops as soon as its [`CancelToken`] is cancelled.
//! Deliveries already dispatched run to completion; anything still queued at
//! that point is dropped.
//!
//! Installers create exactly one daemon per call and signal it to close when
//! the thunk settles. Closing stops new submissions; the worker then drains
//! what was already accepted (unless cancelled) on its own. Only
//! [`Daemon::close`] waits for it.
//!
//! A handler that panics is logged and the worker moves on to the next
//! payload.
//!
//! When the queue is full, [`Daemon::push_event`] waits for room.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::token::CancelToken;

/// Queue capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Daemon configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Maximum number of accepted payloads waiting for the handler.
    pub capacity: usize,
}

impl DaemonConfig {
    /// Config with the given queue capacity. Zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        DaemonConfig {
            capacity: capacity.max(1),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Why a daemon refused a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejected {
    /// The daemon's token was cancelled.
    Cancelled,
    /// The daemon was closed.
    Closed,
}

impl fmt::Display for PushRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushRejected::Cancelled => write!(f, "daemon cancelled"),
            PushRejected::Closed => write!(f, "daemon closed"),
        }
    }
}

impl std::error::Error for PushRejected {}

struct DaemonInner<P> {
    token: CancelToken,
    closed: CancellationToken,
    tx: mpsc::Sender<P>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
}

/// Handle to a running daemon.
///
/// Clones share the same queue and worker.
pub struct Daemon<P> {
    inner: Arc<DaemonInner<P>>,
}

impl<P> Clone for Daemon<P> {
    fn clone(&self) -> Self {
        Daemon {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Daemon<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("capacity", &self.inner.capacity)
            .field("cancelled", &self.inner.token.is_cancelled())
            .field("closed", &self.inner.closed.is_cancelled())
            .field("handler", &"<function>")
            .finish()
    }
}

impl<P: Send + 'static> Daemon<P> {
    /// Start a daemon that calls `handler` for every accepted payload.
    ///
    /// Must be called from within a tokio runtime. The worker inherits the
    /// caller's tracing span.
    pub fn spawn<F, Fut>(token: CancelToken, config: DaemonConfig, handler: F) -> Self
    where
        F: Fn(CancelToken, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let closed = CancellationToken::new();

        let worker = run_worker(token.clone(), closed.clone(), rx, handler);
        let handle = tokio::spawn(worker.in_current_span());

        Daemon {
            inner: Arc::new(DaemonInner {
                token,
                closed,
                tx,
                worker: Mutex::new(Some(handle)),
                capacity,
            }),
        }
    }
}

impl<P> Daemon<P> {
    /// Submit a payload, waiting for queue room if necessary.
    ///
    /// Resolves once the payload is accepted into the queue, not once it has
    /// been handled.
    pub async fn push_event(&self, payload: P) -> Result<(), PushRejected> {
        let inner = &self.inner;
        if inner.token.is_cancelled() {
            return Err(PushRejected::Cancelled);
        }
        if inner.closed.is_cancelled() {
            return Err(PushRejected::Closed);
        }

        tokio::select! {
            biased;
            sent = inner.tx.send(payload) => match sent {
                Ok(()) => {
                    tracing::trace!("payload accepted");
                    Ok(())
                }
                Err(_) if inner.token.is_cancelled() => Err(PushRejected::Cancelled),
                Err(_) => Err(PushRejected::Closed),
            },
            _ = inner.closed.cancelled() => Err(PushRejected::Closed),
            _ = inner.token.cancelled() => Err(PushRejected::Cancelled),
        }
    }

    /// Close the daemon and wait for the worker to finish.
    ///
    /// Payloads accepted before the call are still handled unless the token
    /// is cancelled, so this waits on whatever the handler is doing. Calling
    /// `close` more than once is harmless.
    pub async fn close(&self) {
        self.signal_close();
        if let Some(worker) = self.take_worker() {
            if let Err(err) = worker.await {
                tracing::error!("effect worker failed: {}", err);
            }
        }
    }

    /// Stop accepting payloads without waiting for the worker.
    ///
    /// The worker keeps draining accepted payloads in the background.
    pub fn signal_close(&self) {
        self.inner.closed.cancel();
    }

    /// Returns true once the daemon has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// The token this daemon observes.
    pub fn token(&self) -> &CancelToken {
        &self.inner.token
    }

    /// Configured queue capacity.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns true if both handles refer to the same daemon.
    pub fn ptr_eq(&self, other: &Daemon<P>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        let mut slot = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.take()
    }
}

async fn run_worker<P, F, Fut>(
    token: CancelToken,
    closed: CancellationToken,
    mut rx: mpsc::Receiver<P>,
    handler: F,
) where
    F: Fn(CancelToken, P) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("daemon cancelled");
                break;
            }
            next = rx.recv() => match next {
                Some(payload) => {
                    tracing::trace!("dispatching payload");
                    dispatch(&handler, &token, payload).await;
                }
                None => break,
            },
            _ = closed.cancelled() => {
                while let Ok(payload) = rx.try_recv() {
                    if token.is_cancelled() {
                        break;
                    }
                    dispatch(&handler, &token, payload).await;
                }
                tracing::debug!("daemon closed");
                break;
            }
        }
    }
    rx.close();
}

async fn dispatch<P, F, Fut>(handler: &F, token: &CancelToken, payload: P)
where
    F: Fn(CancelToken, P) -> Fut,
    Fut: Future<Output = ()>,
{
    let handled = AssertUnwindSafe(async { handler(token.clone(), payload).await })
        .catch_unwind()
        .await;
    if let Err(panic) = handled {
        tracing::error!("effect handler panicked: {}", panic_message(&*panic));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
