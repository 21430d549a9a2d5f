//! # Backwater
//!
//! Composable, scoped effect handlers for async Rust.
//!
//! A computation delegates a side effect by name to a handler installed by an
//! enclosing scope. The handler is found by walking an [`EffectContext`], and
//! every scope observes a [`CancelToken`] inherited from its parent.
//!
//! ## Patterns
//!
//! - **Abortive**: handle the first payload, then end the scope
//! - **Fire-and-forget**: handle every payload; triggers only wait for queueing
//! - **Resumable**: the handler resumes the trigger with a value
//! - **Raise**: short-circuit a computation with an error value
//! - **Dependency**: resolve calls against duck-typed services
//!
//! Each installer spawns one [`Daemon`] for its handler, runs the thunk with
//! an extended context, and then runs teardown and closes the daemon on every
//! exit path.
//!
//! ## Quick Example
//!
//! ```rust
//! use backwater::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Overdrawn(i64);
//!
//! async fn withdraw(ctx: &EffectContext, balance: i64, amount: i64) -> Result<i64, EffectError> {
//!     fire_and_forget_effect(ctx, "audit", format!("withdraw {}", amount)).await?;
//!     if amount > balance {
//!         raise_effect(ctx, Overdrawn(amount - balance)).await?;
//!     }
//!     Ok(balance - amount)
//! }
//!
//! # tokio_test::block_on(async {
//! let ctx = EffectContext::empty().with_cancellation(CancelToken::new());
//!
//! let outcome = with_fire_and_forget_effect_handler(
//!     &ctx,
//!     "audit",
//!     |_token, line: String| async move { println!("{}", line) },
//!     HandlerOptions::new(),
//!     |ctx| async move {
//!         with_raise_effect_handler::<Overdrawn, _, _, _>(&ctx, |ctx| async move {
//!             withdraw(&ctx, 50, 80).await
//!         })
//!         .await
//!     },
//! )
//! .await
//! .unwrap()
//! .unwrap();
//!
//! assert_eq!(outcome.into_raised(), Some(Overdrawn(30)));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod context;
pub mod daemon;
pub mod effect;
pub mod error;
mod scope;
pub mod testing;
pub mod token;

// Re-exports
pub use context::EffectContext;
pub use daemon::{Daemon, DaemonConfig, PushRejected, DEFAULT_CAPACITY};
pub use effect::{
    abort_effect, dependency_effect, fire_and_forget_effect, perform_effect, raise_effect,
    with_abortive_effect_handler, with_dependency_effect_handler,
    with_dependency_effect_handler_using, with_fire_and_forget_effect_handler,
    with_raise_effect_handler, with_resumable_effect_handler, RaiseOutcome, Resolver, Resumable,
};
pub use error::{EffectError, RoleMismatch};
pub use scope::HandlerOptions;
pub use token::CancelToken;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::EffectContext;
    pub use crate::effect::{
        abort_effect, dependency_effect, fire_and_forget_effect, perform_effect, raise_effect,
        with_abortive_effect_handler, with_dependency_effect_handler,
        with_fire_and_forget_effect_handler, with_raise_effect_handler,
        with_resumable_effect_handler, RaiseOutcome, Resumable,
    };
    pub use crate::error::EffectError;
    pub use crate::scope::HandlerOptions;
    pub use crate::token::CancelToken;
}
