//! Effect patterns.
//!
//! Each pattern pairs an installer, which binds a handler around a thunk,
//! with a trigger that code inside the thunk calls:
//!
//! | Pattern | Trigger | Trigger waits for |
//! |---------|---------|-------------------|
//! | Abortive | [`abort_effect`] | payload accepted |
//! | Fire-and-forget | [`fire_and_forget_effect`] | payload accepted |
//! | Resumable | [`perform_effect`] | handler's value |
//! | Raise | [`raise_effect`] | scope cancelled |
//! | Dependency | [`dependency_effect`] | service's value |
//!
//! Each trigger pairs with a `with_*_effect_handler` installer of the same
//! pattern, for example [`with_fire_and_forget_effect_handler`].
//!
//! Raise and dependency are built on the abortive and resumable patterns.

pub mod abortive;
pub mod dependency;
pub mod fire_and_forget;
pub mod raise;
pub mod resumable;

pub use abortive::{abort_effect, with_abortive_effect_handler};
pub use dependency::{
    dependency_effect, with_dependency_effect_handler, with_dependency_effect_handler_using,
};
pub use fire_and_forget::{fire_and_forget_effect, with_fire_and_forget_effect_handler};
pub use raise::{raise_effect, raise_effect_name, with_raise_effect_handler, RaiseOutcome};
pub use resumable::{perform_effect, with_resumable_effect_handler, Resolver, Resumable};
