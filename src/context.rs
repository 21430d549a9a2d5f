//! Layered effect contexts.
//!
//! An [`EffectContext`] is a persistent chain of layers. Each layer binds at
//! most one effect name to a [`Daemon`], may carry a [`CancelToken`], and
//! points at exactly one parent. Lookups walk from the newest layer toward
//! the root and return the first match, so a closer binding shadows the same
//! name further up.
//!
//! Layers are never mutated. Extending a context allocates a new child layer;
//! every existing handle to the parent keeps seeing exactly what it saw
//! before. Clones are cheap (one `Arc`).
//!
//! # Examples
//!
//! ```
//! use backwater::{CancelToken, EffectContext, EffectError};
//!
//! let token = CancelToken::new();
//! let ctx = EffectContext::empty().with_cancellation(token.clone());
//!
//! assert!(ctx.lookup_token().is_ok());
//! assert_eq!(
//!     ctx.lookup_handler::<String>("log").unwrap_err(),
//!     EffectError::missing_handler("log")
//! );
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::daemon::Daemon;
use crate::error::EffectError;
use crate::token::CancelToken;

struct Binding {
    name: String,
    payload: &'static str,
    handle: Arc<dyn Any + Send + Sync>,
}

struct Layer {
    binding: Option<Binding>,
    token: Option<CancelToken>,
    parent: Option<Arc<Layer>>,
}

/// Shadowing registry of effect name to handler, plus an inherited
/// cancellation token.
#[derive(Clone, Default)]
pub struct EffectContext {
    head: Option<Arc<Layer>>,
}

impl EffectContext {
    /// The root context. Defines no handlers and no token.
    pub fn empty() -> Self {
        EffectContext { head: None }
    }

    /// Returns a child context whose layer carries `token`.
    ///
    /// Handlers bound in `self` stay visible from the child.
    pub fn with_cancellation(&self, token: CancelToken) -> Self {
        self.push(Layer {
            binding: None,
            token: Some(token),
            parent: self.head.clone(),
        })
    }

    /// Returns a child context binding `name` to `daemon`.
    pub fn extend<P>(&self, name: impl Into<String>, daemon: Daemon<P>) -> Self
    where
        P: Send + 'static,
    {
        self.bind(name.into(), daemon, None)
    }

    /// Returns a child context binding `name` to `daemon` and carrying
    /// `token` in the same layer.
    pub(crate) fn extend_scoped<P>(
        &self,
        name: impl Into<String>,
        daemon: Daemon<P>,
        token: CancelToken,
    ) -> Self
    where
        P: Send + 'static,
    {
        self.bind(name.into(), daemon, Some(token))
    }

    /// Find the closest handler bound to `name`.
    ///
    /// Fails with `MissingHandler` if no layer binds the name, or
    /// `PayloadMismatch` if the closest binding takes another payload type.
    pub fn lookup_handler<P>(&self, name: &str) -> Result<Daemon<P>, EffectError>
    where
        P: Send + 'static,
    {
        let binding = self
            .layers()
            .filter_map(|layer| layer.binding.as_ref())
            .find(|binding| binding.name == name)
            .ok_or_else(|| EffectError::missing_handler(name))?;

        binding
            .handle
            .downcast_ref::<Daemon<P>>()
            .cloned()
            .ok_or_else(|| EffectError::PayloadMismatch {
                name: name.to_string(),
                expected: type_name::<P>(),
            })
    }

    /// Find the closest cancellation token.
    pub fn lookup_token(&self) -> Result<CancelToken, EffectError> {
        self.layers()
            .find_map(|layer| layer.token.clone())
            .ok_or(EffectError::MissingToken)
    }

    /// Returns true if any layer binds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.layers()
            .filter_map(|layer| layer.binding.as_ref())
            .any(|binding| binding.name == name)
    }

    /// The context this one was extended from, or `None` at the root.
    pub fn parent(&self) -> Option<EffectContext> {
        self.head.as_ref().map(|layer| EffectContext {
            head: layer.parent.clone(),
        })
    }

    /// Number of layers between this context and the root.
    pub fn depth(&self) -> usize {
        self.layers().count()
    }

    /// Returns true if this is the root context.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn bind<P>(&self, name: String, daemon: Daemon<P>, token: Option<CancelToken>) -> Self
    where
        P: Send + 'static,
    {
        self.push(Layer {
            binding: Some(Binding {
                name,
                payload: type_name::<P>(),
                handle: Arc::new(daemon),
            }),
            token,
            parent: self.head.clone(),
        })
    }

    fn push(&self, layer: Layer) -> Self {
        EffectContext {
            head: Some(Arc::new(layer)),
        }
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(self.head.as_deref(), |layer| layer.parent.as_deref())
    }
}

impl fmt::Debug for EffectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<(&str, &str)> = self
            .layers()
            .filter_map(|layer| layer.binding.as_ref())
            .map(|binding| (binding.name.as_str(), binding.payload))
            .collect();
        f.debug_struct("EffectContext")
            .field("depth", &self.depth())
            .field("handlers", &names)
            .field("has_token", &self.lookup_token().is_ok())
            .finish()
    }
}
