//! Error types for effect scopes.
//!
//! This module provides [`EffectError`], returned by installers and triggers
//! when the context chain cannot satisfy a request, and [`RoleMismatch`],
//! returned by a [`DuckMatcher`](crate::effect::dependency::DuckMatcher) when a
//! candidate does not fit a role.
//!
//! # Examples
//!
//! ```
//! use backwater::{EffectContext, EffectError};
//!
//! let ctx = EffectContext::empty();
//! assert_eq!(ctx.lookup_token().unwrap_err(), EffectError::MissingToken);
//! ```

use std::error::Error as StdError;
use std::fmt;

/// Errors surfaced by installers and effect triggers.
///
/// Each variant identifies which part of the context chain could not satisfy
/// the request. `MissingToken` and `MissingHandler` are fatal to the caller;
/// the remaining variants describe a handler that exists but cannot answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// No layer of the context carries a cancellation token.
    MissingToken,
    /// No layer of the context binds the requested effect name.
    MissingHandler {
        /// The effect name that was looked up.
        name: String,
    },
    /// A handler is bound under the name but accepts a different payload type.
    PayloadMismatch {
        /// The effect name that was looked up.
        name: String,
        /// The payload type the caller asked for.
        expected: &'static str,
    },
    /// The handler's daemon was closed or cancelled before accepting the payload.
    HandlerClosed {
        /// The effect name whose daemon rejected the payload.
        name: String,
    },
    /// The handler dropped the continuation without resolving it.
    Unresolved {
        /// The effect name whose handler dropped the continuation.
        name: String,
    },
}

impl EffectError {
    /// Create a `MissingHandler` error for the given name.
    pub fn missing_handler(name: impl Into<String>) -> Self {
        EffectError::MissingHandler { name: name.into() }
    }
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectError::MissingToken => {
                write!(f, "missing cancellation token in effect context")
            }
            EffectError::MissingHandler { name } => {
                write!(f, "no handler registered for effect '{}'", name)
            }
            EffectError::PayloadMismatch { name, expected } => write!(
                f,
                "handler for effect '{}' does not accept payloads of type {}",
                name, expected
            ),
            EffectError::HandlerClosed { name } => {
                write!(f, "handler for effect '{}' is closed", name)
            }
            EffectError::Unresolved { name } => write!(
                f,
                "handler for effect '{}' dropped the continuation without resolving it",
                name
            ),
        }
    }
}

impl StdError for EffectError {}

/// A dependency candidate does not structurally satisfy a role.
///
/// Recovered locally by the dependency handler, which moves on to the next
/// candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMismatch {
    /// The role member that could not be matched.
    pub member: String,
    /// Why the member did not match.
    pub reason: String,
}

impl RoleMismatch {
    /// Create a new role mismatch for `member`.
    pub fn new(member: impl Into<String>, reason: impl Into<String>) -> Self {
        RoleMismatch {
            member: member.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RoleMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role member '{}' not satisfied: {}", self.member, self.reason)
    }
}

impl StdError for RoleMismatch {}
