//! Shared installer skeleton.
//!
//! Every installer follows the same acquire/use/release shape:
//!
//! 1. **Acquire**: spawn one [`Daemon`] and extend the parent context with it
//! 2. **Use**: run the thunk with the extended context
//! 3. **Release**: run the optional teardown, then close the daemon
//!
//! Release is tied to a [`ScopeGuard`], so it also runs when the thunk
//! panics or when the installer's future is dropped before completion (for
//! example because an enclosing raise scope won its race). Release never
//! waits on the handler: the daemon is signalled to close and its worker
//! drains in the background.

use std::fmt;
use std::future::Future;

use tracing::Instrument;

use crate::context::EffectContext;
use crate::daemon::{Daemon, DaemonConfig};
use crate::token::CancelToken;

type Teardown = Box<dyn FnOnce() + Send>;

/// Per-installation options.
///
/// # Example
///
/// ```
/// use backwater::HandlerOptions;
///
/// let options = HandlerOptions::new()
///     .with_capacity(32)
///     .with_teardown(|| println!("scope closed"));
/// assert_eq!(options.capacity(), 32);
/// ```
#[derive(Default)]
pub struct HandlerOptions {
    config: DaemonConfig,
    teardown: Option<Teardown>,
}

impl HandlerOptions {
    /// Default options: capacity 10, no teardown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daemon's queue capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config = DaemonConfig::with_capacity(capacity);
        self
    }

    /// Run `teardown` once after the thunk settles, before the daemon closes.
    pub fn with_teardown(mut self, teardown: impl FnOnce() + Send + 'static) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }

    /// Configured queue capacity.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }
}

impl fmt::Debug for HandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("config", &self.config)
            .field("teardown", &self.teardown.as_ref().map(|_| "<function>"))
            .finish()
    }
}

/// Guaranteed teardown for one installation.
///
/// Dropping the guard runs the teardown (if it has not run yet) and signals
/// the daemon to close. [`release`](Self::release) is the normal-exit path.
pub(crate) struct ScopeGuard<P> {
    daemon: Daemon<P>,
    teardown: Option<Teardown>,
}

impl<P> ScopeGuard<P> {
    pub(crate) fn new(daemon: Daemon<P>, teardown: Option<Teardown>) -> Self {
        ScopeGuard { daemon, teardown }
    }

    pub(crate) fn release(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
        tracing::debug!("effect scope released");
    }
}

impl<P> Drop for ScopeGuard<P> {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            tracing::debug!("effect scope dropped before completion");
            teardown();
        }
        self.daemon.signal_close();
    }
}

/// What an installer binds and which tokens it uses.
pub(crate) struct Scope<'a> {
    pub(crate) kind: &'static str,
    pub(crate) name: String,
    pub(crate) parent: &'a EffectContext,
    /// Token the daemon observes.
    pub(crate) daemon_token: CancelToken,
    /// Token recorded on the new context layer, if the scope has its own.
    pub(crate) scope_token: Option<CancelToken>,
}

/// Spawn the daemon, run the thunk under the extended context, release.
pub(crate) async fn install<P, H, HFut, F, Fut, T>(
    scope: Scope<'_>,
    options: HandlerOptions,
    handle_event: H,
    thunk: F,
) -> T
where
    P: Send + 'static,
    H: Fn(CancelToken, P) -> HFut + Send + Sync + 'static,
    HFut: Future<Output = ()> + Send + 'static,
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    let span = tracing::debug_span!("effect_scope", effect = %scope.name, kind = scope.kind);
    let daemon = span.in_scope(|| {
        tracing::debug!("effect scope installed");
        Daemon::spawn(scope.daemon_token, options.config, handle_event)
    });

    let ctx = match scope.scope_token {
        Some(token) => scope.parent.extend_scoped(scope.name, daemon.clone(), token),
        None => scope.parent.extend(scope.name, daemon.clone()),
    };

    let guard = ScopeGuard::new(daemon, options.teardown);
    let output = thunk(ctx).instrument(span.clone()).await;
    span.in_scope(|| guard.release());
    output
}
