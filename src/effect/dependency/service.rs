//! Dependency candidates.
//!
//! A [`Service`] is a named bag of members. Methods take JSON arguments and
//! may declare a [`Signature`], the way a quackable function carries its
//! shape; fields are plain values and cannot be called.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::signature::Signature;

/// Error returned by a failing dependency method.
pub type CallError = Box<dyn std::error::Error + Send + Sync>;

/// Result of invoking a dependency method.
pub type CallResult = Result<Value, CallError>;

/// Type-erased method implementation.
pub type MethodFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, CallResult> + Send + Sync>;

/// One member of a [`Service`].
#[derive(Clone)]
pub enum Member {
    /// A callable member.
    Method {
        /// Declared shape, if any.
        signature: Option<Signature>,
        /// The implementation.
        call: MethodFn,
    },
    /// A non-callable value.
    Field(Value),
}

impl Member {
    /// Returns true for methods.
    pub fn is_callable(&self) -> bool {
        matches!(self, Member::Method { .. })
    }

    /// The declared signature of a method, if any.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Member::Method { signature, .. } => signature.as_ref(),
            Member::Field(_) => None,
        }
    }

    /// Start a call with `args`, or `None` if the member is not callable.
    pub fn invoke(&self, args: Vec<Value>) -> Option<BoxFuture<'static, CallResult>> {
        match self {
            Member::Method { call, .. } => Some(call(args)),
            Member::Field(_) => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Method { signature, .. } => f
                .debug_struct("Method")
                .field("signature", &signature.as_ref().map(ToString::to_string))
                .field("call", &"<function>")
                .finish(),
            Member::Field(value) => f.debug_tuple("Field").field(value).finish(),
        }
    }
}

/// A dependency candidate: a name plus named members.
///
/// # Example
///
/// ```
/// use backwater::effect::dependency::Service;
/// use serde_json::json;
///
/// let greeter = Service::new("greeter")
///     .quackable(
///         "greet",
///         "(name: string) => string".parse().unwrap(),
///         |args| Ok(json!(format!("Hello, {}", args[0].as_str().unwrap_or("?")))),
///     )
///     .field("version", json!("1.0"));
///
/// assert!(greeter.member("greet").unwrap().is_callable());
/// assert!(!greeter.member("version").unwrap().is_callable());
/// ```
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    members: BTreeMap<String, Member>,
}

impl Service {
    /// An empty service.
    pub fn new(name: impl Into<String>) -> Self {
        Service {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Add a method without a declared signature.
    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> CallResult + Send + Sync + 'static,
    {
        self.with_method(name, None, move |args| futures::future::ready(f(args)))
    }

    /// Add an async method without a declared signature.
    pub fn method_async<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.with_method(name, None, f)
    }

    /// Add a method that declares its signature.
    pub fn quackable<F>(self, name: impl Into<String>, signature: Signature, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> CallResult + Send + Sync + 'static,
    {
        self.with_method(name, Some(signature), move |args| futures::future::ready(f(args)))
    }

    /// Add an async method that declares its signature.
    pub fn quackable_async<F, Fut>(
        self,
        name: impl Into<String>,
        signature: Signature,
        f: F,
    ) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.with_method(name, Some(signature), f)
    }

    /// Add a non-callable member.
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), Member::Field(value));
        self
    }

    /// The service name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// All members, ordered by name.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    fn with_method<F, Fut>(
        mut self,
        name: impl Into<String>,
        signature: Option<Signature>,
        f: F,
    ) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let call: MethodFn = Arc::new(move |args| f(args).boxed());
        self.members.insert(name.into(), Member::Method { signature, call });
        self
    }
}
