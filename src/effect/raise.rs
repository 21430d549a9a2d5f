//! Raise effects: short-circuit a computation with an error value.
//!
//! [`with_raise_effect_handler`] races two things: the thunk finishing, and an
//! error arriving at a private abortive handler. Whichever comes first
//! decides the outcome; the loser is dropped. [`raise_effect`] can be called
//! from any depth of nested async calls, as long as the context it receives
//! descends from the installer's.
//!
//! Raise handlers are keyed by error type, so nested raise scopes for
//! different error types do not shadow each other.
//!
//! # Example
//!
//! ```
//! use backwater::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct NotFound(u32);
//!
//! async fn load(ctx: &EffectContext, id: u32) -> Result<String, EffectError> {
//!     if id != 1 {
//!         raise_effect(ctx, NotFound(id)).await?;
//!     }
//!     Ok("alice".to_string())
//! }
//!
//! # tokio_test::block_on(async {
//! let ctx = EffectContext::empty().with_cancellation(CancelToken::new());
//!
//! let found = with_raise_effect_handler::<NotFound, _, _, _>(&ctx, |ctx| async move {
//!     load(&ctx, 1).await
//! })
//! .await
//! .unwrap();
//! assert!(found.is_completed());
//!
//! let missing = with_raise_effect_handler::<NotFound, _, _, _>(&ctx, |ctx| async move {
//!     load(&ctx, 7).await
//! })
//! .await
//! .unwrap();
//! assert_eq!(missing.into_raised(), Some(NotFound(7)));
//! # });
//! ```

use std::any::type_name;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::context::EffectContext;
use crate::effect::abortive::{abort_effect, with_abortive_effect_handler};
use crate::error::EffectError;
use crate::scope::HandlerOptions;
use crate::token::CancelToken;

/// How a raise scope ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaiseOutcome<T, E> {
    /// The thunk finished without raising.
    Completed(T),
    /// An error was raised before the thunk finished.
    Raised(E),
}

impl<T, E> RaiseOutcome<T, E> {
    /// Returns true if an error was raised.
    pub fn is_raised(&self) -> bool {
        matches!(self, RaiseOutcome::Raised(_))
    }

    /// Returns true if the thunk finished normally.
    pub fn is_completed(&self) -> bool {
        matches!(self, RaiseOutcome::Completed(_))
    }

    /// The raised error, if any.
    pub fn raised(&self) -> Option<&E> {
        match self {
            RaiseOutcome::Raised(e) => Some(e),
            RaiseOutcome::Completed(_) => None,
        }
    }

    /// Consume and return the raised error, if any.
    pub fn into_raised(self) -> Option<E> {
        match self {
            RaiseOutcome::Raised(e) => Some(e),
            RaiseOutcome::Completed(_) => None,
        }
    }

    /// Convert to a `Result`, treating a raised error as `Err`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RaiseOutcome::Completed(value) => Ok(value),
            RaiseOutcome::Raised(e) => Err(e),
        }
    }
}

impl<T, E> From<RaiseOutcome<T, E>> for Result<T, E> {
    fn from(outcome: RaiseOutcome<T, E>) -> Self {
        outcome.into_result()
    }
}

/// The effect name a raise scope for error type `E` binds.
pub fn raise_effect_name<E>() -> String {
    format!("effect_raise::{}", type_name::<E>())
}

/// Run `thunk` in a scope that [`raise_effect`] can short-circuit.
///
/// Returns `Completed` with the thunk's output if it finishes first, or
/// `Raised` with the exact error value delivered by the first
/// `raise_effect::<E>`. Later raises are never delivered.
///
/// Fails with `MissingToken` if `pctx` carries no cancellation token.
pub async fn with_raise_effect_handler<E, F, Fut, T>(
    pctx: &EffectContext,
    thunk: F,
) -> Result<RaiseOutcome<T, E>, EffectError>
where
    E: Send + 'static,
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    let (raised_tx, mut raised_rx) = oneshot::channel::<E>();
    let slot = Mutex::new(Some(raised_tx));

    let handle_event = move |_: CancelToken, err: E| {
        let sender = slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(err);
        }
        futures::future::ready(())
    };

    let scope = with_abortive_effect_handler(
        pctx,
        raise_effect_name::<E>(),
        handle_event,
        HandlerOptions::new(),
        thunk,
    );
    tokio::pin!(scope);

    tokio::select! {
        biased;
        Ok(err) = &mut raised_rx => {
            tracing::debug!(error_type = type_name::<E>(), "raise scope short-circuited");
            Ok(RaiseOutcome::Raised(err))
        }
        completed = &mut scope => match raised_rx.try_recv() {
            Ok(err) => Ok(RaiseOutcome::Raised(err)),
            Err(_) => completed.map(RaiseOutcome::Completed),
        },
    }
}

/// Raise `err` to the closest enclosing raise scope for `E`.
///
/// Does not return until that scope has been cancelled, which normally means
/// the scope has already dropped the computation calling this. Fails with
/// `MissingHandler` if no raise scope for `E` encloses `ctx`.
pub async fn raise_effect<E>(ctx: &EffectContext, err: E) -> Result<(), EffectError>
where
    E: Send + 'static,
{
    let name = raise_effect_name::<E>();
    let daemon = ctx.lookup_handler::<E>(&name)?;
    abort_effect(ctx, &name, err).await?;
    daemon.token().cancelled().await;
    Ok(())
}
