//! Testing utilities for code that installs or triggers effects.
//!
//! # Examples
//!
//! ## Live contexts and call logs
//!
//! ```rust
//! use backwater::prelude::*;
//! use backwater::testing::{live_context, CallLog};
//!
//! # tokio_test::block_on(async {
//! let (ctx, _root) = live_context();
//! let seen = CallLog::new();
//! let log = seen.clone();
//!
//! with_fire_and_forget_effect_handler(
//!     &ctx,
//!     "audit",
//!     move |_, entry: u32| {
//!         log.record(entry);
//!         async {}
//!     },
//!     HandlerOptions::new(),
//!     |ctx| async move { fire_and_forget_effect(&ctx, "audit", 7u32).await },
//! )
//! .await
//! .unwrap()
//! .unwrap();
//!
//! // the handler may still be running after the installer returns
//! seen.wait_for(1).await;
//! assert_eq!(seen.calls(), vec![7]);
//! # });
//! ```
//!
//! ## Assertion macros
//!
//! ```rust
//! use backwater::{assert_completed, assert_raised, RaiseOutcome};
//!
//! let done: RaiseOutcome<i32, &str> = RaiseOutcome::Completed(1);
//! assert_completed!(done);
//!
//! let raised: RaiseOutcome<i32, &str> = RaiseOutcome::Raised("boom");
//! assert_raised!(raised, "boom");
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::context::EffectContext;
use crate::token::CancelToken;

/// A context carrying a fresh token, plus that token.
///
/// Cancelling the returned token ends every scope installed under the
/// context.
pub fn live_context() -> (EffectContext, CancelToken) {
    let token = CancelToken::new();
    (EffectContext::empty().with_cancellation(token.clone()), token)
}

/// Shared, ordered record of calls made by handlers or services.
///
/// Clones share the same record, so a clone can move into a handler while
/// the test keeps the original.
pub struct CallLog<T> {
    inner: Arc<CallLogInner<T>>,
}

struct CallLogInner<T> {
    calls: Mutex<Vec<T>>,
    recorded: Notify,
}

impl<T> CallLog<T> {
    /// An empty log.
    pub fn new() -> Self {
        CallLog {
            inner: Arc::new(CallLogInner {
                calls: Mutex::new(Vec::new()),
                recorded: Notify::new(),
            }),
        }
    }

    /// Append a call.
    pub fn record(&self, call: T) {
        self.lock().push(call);
        self.inner.recorded.notify_waiters();
    }

    /// Wait until at least `count` calls have been recorded.
    ///
    /// Handlers keep running after their installer returns, so tests use
    /// this (usually under a timeout) before inspecting the log.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let recorded = self.inner.recorded.notified();
            tokio::pin!(recorded);
            recorded.as_mut().enable();
            if self.len() >= count {
                return;
            }
            recorded.await;
        }
    }

    /// Number of recorded calls.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> CallLog<T> {
    /// A snapshot of the recorded calls, oldest first.
    pub fn calls(&self) -> Vec<T> {
        self.lock().clone()
    }
}

impl<T> Clone for CallLog<T> {
    fn clone(&self) -> Self {
        CallLog {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for CallLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallLog").field(&*self.lock()).finish()
    }
}

/// Assert that a raise scope completed without raising.
///
/// This macro will panic if the outcome is `Raised`.
#[macro_export]
macro_rules! assert_completed {
    ($outcome:expr) => {
        match $outcome {
            $crate::RaiseOutcome::Completed(_) => {}
            $crate::RaiseOutcome::Raised(e) => {
                panic!("Expected Completed, got Raised: {:?}", e);
            }
        }
    };
}

/// Assert that a raise scope ended with a raised error, optionally equal to
/// `$expected`.
///
/// This macro will panic if the outcome is `Completed`.
#[macro_export]
macro_rules! assert_raised {
    ($outcome:expr) => {
        match $outcome {
            $crate::RaiseOutcome::Raised(_) => {}
            $crate::RaiseOutcome::Completed(v) => {
                panic!("Expected Raised, got Completed: {:?}", v);
            }
        }
    };
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            $crate::RaiseOutcome::Raised(e) => {
                assert_eq!(e, $expected);
            }
            $crate::RaiseOutcome::Completed(v) => {
                panic!("Expected Raised with {:?}, got Completed: {:?}", $expected, v);
            }
        }
    };
}
