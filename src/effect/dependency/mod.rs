//! Dependency effects: resolve calls against duck-typed services.
//!
//! A dependency scope owns an ordered list of [`Service`]s. Code inside the
//! scope asks for a role (member names and signatures) and a call; the
//! handler picks the first service that plays the role, invokes the member,
//! and resumes the caller with the result.
//!
//! Resolution never fails the caller. When no service fits, the request goes
//! to the enclosing dependency scope if there is one, and resolves to `None`
//! otherwise. A member that errors also resolves to `None`; the error is
//! logged at debug level.
//!
//! # Example
//!
//! ```
//! use backwater::prelude::*;
//! use backwater::effect::dependency::{Call, DependencyCall, Role, Service};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let ctx = EffectContext::empty().with_cancellation(CancelToken::new());
//! let greeter = Service::new("greeter").quackable(
//!     "greet",
//!     "(name: string) => string".parse().unwrap(),
//!     |args| Ok(json!(format!("Hello, {}", args[0].as_str().unwrap_or_default()))),
//! );
//!
//! let reply = with_dependency_effect_handler(&ctx, vec![greeter], |ctx| async move {
//!     let role = Role::parse([("greet", "(name: string) => string")]).unwrap();
//!     let call = Call::new("greet", vec![json!("Juno")]);
//!     dependency_effect(&ctx, DependencyCall::new(role, call)).await
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(reply, Ok(Some(json!("Hello, Juno"))));
//! # });
//! ```

mod matcher;
mod service;
mod signature;

pub use matcher::{DuckMatcher, Role, RoleView, StructuralMatcher};
pub use service::{CallError, CallResult, Member, MethodFn, Service};
pub use signature::{Param, Signature, SignatureParseError, ValueKind};

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::context::EffectContext;
use crate::effect::resumable::{perform_effect, with_resumable_effect_handler, Resumable};
use crate::error::EffectError;
use crate::scope::HandlerOptions;
use crate::token::CancelToken;

/// The effect name every dependency scope binds.
pub const DEPENDENCY_EFFECT: &str = "effect_dependency";

/// A member invocation: name plus JSON arguments.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Call {
    /// Member to invoke.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl Call {
    /// Call `name` with `args`.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Call {
            name: name.into(),
            args,
        }
    }
}

/// Payload of a dependency effect: the role a service must play and the
/// call to make on it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyCall {
    /// Interface the chosen service must satisfy.
    pub role: Role,
    /// The invocation.
    pub call: Call,
}

impl DependencyCall {
    /// Pair a role with a call.
    pub fn new(role: Role, call: Call) -> Self {
        DependencyCall { role, call }
    }
}

type Request = Resumable<DependencyCall, Option<Value>>;

/// Install a dependency handler over `dependencies` using the
/// [`StructuralMatcher`].
///
/// Fails with `MissingToken` if `pctx` carries no cancellation token.
pub async fn with_dependency_effect_handler<F, Fut, T>(
    pctx: &EffectContext,
    dependencies: Vec<Service>,
    thunk: F,
) -> Result<T, EffectError>
where
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    with_dependency_effect_handler_using(pctx, dependencies, StructuralMatcher, thunk).await
}

/// Install a dependency handler that decides role fit with `matcher`.
pub async fn with_dependency_effect_handler_using<M, F, Fut, T>(
    pctx: &EffectContext,
    dependencies: Vec<Service>,
    matcher: M,
    thunk: F,
) -> Result<T, EffectError>
where
    M: DuckMatcher + 'static,
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    let resolver = Arc::new(CallResolver {
        dependencies,
        matcher,
        parent: pctx.clone(),
    });

    let handle_event = move |_: CancelToken, request: Request| {
        let resolver = resolver.clone();
        async move {
            let (call, resume) = request.into_parts();
            let result = resolver.resolve(&call).await;
            if !resume.resolve(result) {
                tracing::debug!(member = %call.call.name, "dependency caller went away");
            }
        }
    };

    with_resumable_effect_handler(
        pctx,
        DEPENDENCY_EFFECT,
        handle_event,
        HandlerOptions::new(),
        thunk,
    )
    .await
}

/// Ask the closest dependency scope to perform `call`.
///
/// Resolves to `Ok(None)` when no service in any enclosing scope can answer
/// or the chosen member failed. Fails with `MissingHandler` outside every
/// dependency scope.
pub async fn dependency_effect(
    ctx: &EffectContext,
    call: DependencyCall,
) -> Result<Option<Value>, EffectError> {
    perform_effect::<DependencyCall, Option<Value>>(ctx, DEPENDENCY_EFFECT, call).await
}

struct CallResolver<M> {
    dependencies: Vec<Service>,
    matcher: M,
    parent: EffectContext,
}

impl<M: DuckMatcher> CallResolver<M> {
    async fn resolve(&self, request: &DependencyCall) -> Option<Value> {
        let name = request.call.name.as_str();

        for service in &self.dependencies {
            let view = match self.matcher.expect_role(&request.role, service) {
                Ok(view) => view,
                Err(mismatch) => {
                    tracing::trace!(service = service.name(), "skipped: {}", mismatch);
                    continue;
                }
            };
            let Some(member) = view.get(name) else {
                continue;
            };
            if let Some(signature) = member.signature() {
                if !signature.accepts_args(&request.call.args) {
                    tracing::trace!(
                        service = view.service_name(),
                        member = name,
                        "skipped: arguments do not fit {}",
                        signature
                    );
                    continue;
                }
            }
            let Some(pending) = member.invoke(request.call.args.clone()) else {
                continue;
            };

            return match pending.await {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::debug!(
                        service = view.service_name(),
                        member = name,
                        "error calling {} on dependency: {}",
                        name,
                        err
                    );
                    None
                }
            };
        }

        if self.parent.contains(DEPENDENCY_EFFECT) {
            return match dependency_effect(&self.parent, request.clone()).await {
                Ok(value) => value,
                Err(err) => {
                    tracing::debug!(member = name, "parent dependency scope failed: {}", err);
                    None
                }
            };
        }
        None
    }
}
