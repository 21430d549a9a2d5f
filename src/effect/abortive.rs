//! Abortive effects: handle one payload, then end the scope.
//!
//! The installer creates a private token and merges it with the inherited
//! one. The handler cancels the private token right after handling its first
//! payload, so the daemon never delivers a second one. Cancelling the parent
//! token ends the scope the same way.
//!
//! # Example
//!
//! ```
//! use backwater::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let ctx = EffectContext::empty().with_cancellation(CancelToken::new());
//!
//! with_abortive_effect_handler(
//!     &ctx,
//!     "stop",
//!     |_token, reason: String| async move { println!("stopping: {}", reason) },
//!     HandlerOptions::new(),
//!     |ctx| async move {
//!         abort_effect(&ctx, "stop", "done".to_string()).await?;
//!         // ignored: the scope has already handled its one payload
//!         abort_effect(&ctx, "stop", "again".to_string()).await
//!     },
//! )
//! .await
//! .unwrap()
//! .unwrap();
//! # });
//! ```

use std::future::Future;

use crate::context::EffectContext;
use crate::error::EffectError;
use crate::scope::{install, HandlerOptions, Scope};
use crate::token::CancelToken;

/// Install a one-shot handler for `effect_name` around `thunk`.
///
/// `handle_event` receives the scope token and the first payload; the scope
/// is cancelled as soon as it returns. The context passed to the thunk
/// carries the scope token, so nested installers stop with it.
///
/// Teardown (from `options`) and daemon closure run after the thunk settles,
/// on every exit path.
///
/// Fails with `MissingToken` if `pctx` carries no cancellation token.
pub async fn with_abortive_effect_handler<P, H, HFut, F, Fut, T>(
    pctx: &EffectContext,
    effect_name: impl Into<String>,
    handle_event: H,
    options: HandlerOptions,
    thunk: F,
) -> Result<T, EffectError>
where
    P: Send + 'static,
    H: Fn(CancelToken, P) -> HFut + Send + Sync + 'static,
    HFut: Future<Output = ()> + Send + 'static,
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    let parent = pctx.lookup_token()?;
    let private = CancelToken::new();
    let scope_token = private.merge(&parent);

    let once = move |token: CancelToken, payload: P| {
        let handled = handle_event(token, payload);
        let private = private.clone();
        async move {
            handled.await;
            private.cancel();
        }
    };

    let scope = Scope {
        kind: "abortive",
        name: effect_name.into(),
        parent: pctx,
        daemon_token: scope_token.clone(),
        scope_token: Some(scope_token),
    };
    Ok(install(scope, options, once, thunk).await)
}

/// Push `payload` to the abortive handler bound to `name`.
///
/// Resolves once the payload is accepted. If the scope has already handled
/// a payload (or was cancelled), the call has no effect.
pub async fn abort_effect<P>(ctx: &EffectContext, name: &str, payload: P) -> Result<(), EffectError>
where
    P: Send + 'static,
{
    let daemon = ctx.lookup_handler::<P>(name)?;
    if let Err(rejected) = daemon.push_event(payload).await {
        tracing::debug!(effect = name, "abortive payload ignored: {}", rejected);
    }
    Ok(())
}
