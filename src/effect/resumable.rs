//! Resumable effects: the handler resumes the trigger with a value.
//!
//! [`perform_effect`] pairs its payload with a one-shot [`Resolver`], queues
//! the pair as a [`Resumable`], and suspends until the handler resolves it.
//! `Resolver::resolve` consumes the resolver, so a trigger is resumed at most
//! once. The handler may resolve later, from another task, after further
//! triggers.
//!
//! # Example
//!
//! ```
//! use backwater::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let ctx = EffectContext::empty().with_cancellation(CancelToken::new());
//!
//! let greeting = with_resumable_effect_handler(
//!     &ctx,
//!     "greet",
//!     |_token, request: Resumable<String, String>| async move {
//!         let reply = format!("hello {}", request.payload());
//!         request.resolve(reply);
//!     },
//!     HandlerOptions::new(),
//!     |ctx| async move {
//!         perform_effect::<String, String>(&ctx, "greet", "world".to_string()).await
//!     },
//! )
//! .await
//! .unwrap();
//!
//! assert_eq!(greeting, Ok("hello world".to_string()));
//! # });
//! ```

use std::fmt;
use std::future::Future;

use tokio::sync::oneshot;

use crate::context::EffectContext;
use crate::error::EffectError;
use crate::scope::{install, HandlerOptions, Scope};
use crate::token::CancelToken;

/// One-shot continuation back to a suspended [`perform_effect`] call.
pub struct Resolver<R> {
    tx: oneshot::Sender<R>,
}

impl<R> Resolver<R> {
    /// Resume the trigger with `value`.
    ///
    /// Returns false if the trigger is no longer waiting (its scope was torn
    /// down); the value is dropped in that case.
    pub fn resolve(self, value: R) -> bool {
        self.tx.send(value).is_ok()
    }

    /// Returns true while the trigger is still waiting for a value.
    pub fn is_waiting(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl<R> fmt::Debug for Resolver<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

/// A payload paired with the continuation that resumes its trigger.
#[derive(Debug)]
pub struct Resumable<P, R> {
    payload: P,
    resolver: Resolver<R>,
}

impl<P, R> Resumable<P, R> {
    /// Pair a payload with a resolver.
    pub fn new(payload: P, resolver: Resolver<R>) -> Self {
        Resumable { payload, resolver }
    }

    /// Create a payload and the receiving end of its continuation.
    pub fn channel(payload: P) -> (Self, oneshot::Receiver<R>) {
        let (tx, rx) = oneshot::channel();
        (Resumable::new(payload, Resolver { tx }), rx)
    }

    /// The trigger's payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Resume the trigger with `value`. See [`Resolver::resolve`].
    pub fn resolve(self, value: R) -> bool {
        self.resolver.resolve(value)
    }

    /// Split into payload and resolver, e.g. to resolve from another task.
    pub fn into_parts(self) -> (P, Resolver<R>) {
        (self.payload, self.resolver)
    }
}

/// Install a resumable handler for `effect_name` around `thunk`.
///
/// `handle_event` receives each [`Resumable`] in submission order and is
/// expected to resolve it, now or later. Runs until the inherited token is
/// cancelled.
///
/// Fails with `MissingToken` if `pctx` carries no cancellation token.
pub async fn with_resumable_effect_handler<P, R, H, HFut, F, Fut, T>(
    pctx: &EffectContext,
    effect_name: impl Into<String>,
    handle_event: H,
    options: HandlerOptions,
    thunk: F,
) -> Result<T, EffectError>
where
    P: Send + 'static,
    R: Send + 'static,
    H: Fn(CancelToken, Resumable<P, R>) -> HFut + Send + Sync + 'static,
    HFut: Future<Output = ()> + Send + 'static,
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    let token = pctx.lookup_token()?;
    let scope = Scope {
        kind: "resumable",
        name: effect_name.into(),
        parent: pctx,
        daemon_token: token,
        scope_token: None,
    };
    Ok(install(scope, options, handle_event, thunk).await)
}

/// Trigger the resumable effect `name` and wait for the handler's value.
///
/// Fails with `HandlerClosed` if the handler's scope no longer accepts
/// payloads, and with `Unresolved` if the handler drops the continuation
/// without resolving it.
pub async fn perform_effect<P, R>(
    ctx: &EffectContext,
    name: &str,
    payload: P,
) -> Result<R, EffectError>
where
    P: Send + 'static,
    R: Send + 'static,
{
    let daemon = ctx.lookup_handler::<Resumable<P, R>>(name)?;
    let (resumable, resumed) = Resumable::channel(payload);

    if let Err(rejected) = daemon.push_event(resumable).await {
        tracing::debug!(effect = name, "resumable payload rejected: {}", rejected);
        return Err(EffectError::HandlerClosed {
            name: name.to_string(),
        });
    }

    resumed.await.map_err(|_| EffectError::Unresolved {
        name: name.to_string(),
    })
}
