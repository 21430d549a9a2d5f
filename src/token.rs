//! Mergeable cancellation tokens.
//!
//! A [`CancelToken`] is a one-way flag that moves from live to cancelled
//! exactly once. Tokens can be merged: the derived token reports cancellation
//! as soon as any of its sources does, while cancelling the derived token
//! never reaches back into its sources.
//!
//! ```
//! use backwater::CancelToken;
//!
//! let parent = CancelToken::new();
//! let private = CancelToken::new();
//! let scope = private.merge(&parent);
//!
//! private.cancel();
//! assert!(scope.is_cancelled());
//! assert!(!parent.is_cancelled());
//! ```

use std::sync::Arc;

use futures::future::select_all;
use tokio_util::sync::CancellationToken;

/// One-way, mergeable cancellation flag.
///
/// Cloning a token yields a handle to the same flag. Cancellation flows
/// downward only: a token derived with [`merge`](Self::merge) or
/// [`child`](Self::child) observes its sources, never the other way round.
#[derive(Debug, Clone)]
pub struct CancelToken {
    own: CancellationToken,
    sources: Arc<[CancellationToken]>,
}

impl CancelToken {
    /// Create a fresh, live token with no sources.
    pub fn new() -> Self {
        CancelToken {
            own: CancellationToken::new(),
            sources: Arc::from(Vec::new()),
        }
    }

    /// Cancel this token.
    ///
    /// Idempotent. Tokens derived from this one observe the cancellation;
    /// tokens this one was derived from do not.
    pub fn cancel(&self) {
        self.own.cancel();
    }

    /// Returns true once this token or any of its sources is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flags().any(CancellationToken::is_cancelled)
    }

    /// Resolves once this token or any of its sources is cancelled.
    pub async fn cancelled(&self) {
        if self.sources.is_empty() {
            return self.own.cancelled().await;
        }
        let waits = self.flags().map(|flag| Box::pin(flag.cancelled()));
        select_all(waits).await;
    }

    /// Derive a token cancelled by either `self` or `other`.
    pub fn merge(&self, other: &CancelToken) -> CancelToken {
        CancelToken::merge_all([self, other])
    }

    /// Derive a token cancelled by any of the given tokens.
    ///
    /// With no inputs the result is a fresh live token.
    pub fn merge_all<'a>(tokens: impl IntoIterator<Item = &'a CancelToken>) -> CancelToken {
        let sources: Vec<CancellationToken> = tokens
            .into_iter()
            .flat_map(|token| token.flags().cloned())
            .collect();
        CancelToken {
            own: CancellationToken::new(),
            sources: sources.into(),
        }
    }

    /// Derive a token that is cancelled with `self` but can also be
    /// cancelled on its own.
    pub fn child(&self) -> CancelToken {
        CancelToken::merge_all([self])
    }

    fn flags(&self) -> impl Iterator<Item = &CancellationToken> {
        std::iter::once(&self.own).chain(self.sources.iter())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<CancellationToken> for CancelToken {
    fn from(token: CancellationToken) -> Self {
        CancelToken {
            own: token,
            sources: Arc::from(Vec::new()),
        }
    }
}
