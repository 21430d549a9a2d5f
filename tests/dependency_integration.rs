//! Integration tests for dependency effects.
//!
//! These tests build small service graphs and check candidate order,
//! fallback through nested scopes, and the swallow-and-log failure policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backwater::effect::dependency::{
    Call, CallError, DependencyCall, DuckMatcher, Role, RoleView, Service, Signature,
    StructuralMatcher,
};
use backwater::prelude::*;
use backwater::testing::{live_context, CallLog};
use backwater::{with_dependency_effect_handler_using, RoleMismatch};
use serde_json::{json, Value};

fn repo_role() -> Role {
    Role::parse([
        ("find", "(id: number) => object"),
        ("count", "() => number"),
    ])
    .unwrap()
}

fn find(id: i64) -> DependencyCall {
    DependencyCall::new(repo_role(), Call::new("find", vec![json!(id)]))
}

fn user_repo(users: Vec<(i64, &'static str)>) -> Service {
    let total = users.len();
    Service::new("users")
        .quackable_async(
            "find",
            "(id: number) => object".parse().unwrap(),
            move |args| {
                let users = users.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    let id = args[0].as_i64().ok_or("id must be a number")?;
                    let (_, name) = users
                        .into_iter()
                        .find(|(candidate, _)| *candidate == id)
                        .ok_or_else(|| format!("user {} not found", id))?;
                    Ok::<Value, CallError>(json!({ "id": id, "name": name }))
                }
            },
        )
        .quackable("count", "() => number".parse().unwrap(), move |_| Ok(json!(total)))
}

#[tokio::test]
async fn resolves_against_first_service_playing_the_role() {
    let (ctx, _) = live_context();
    let partial = Service::new("partial").method("find", |_| Ok(json!("wrong")));
    let deps = vec![partial, user_repo(vec![(1, "ada")])];

    let found = with_dependency_effect_handler(&ctx, deps, |ctx| async move {
        dependency_effect(&ctx, find(1)).await
    })
    .await
    .unwrap();

    // "partial" lacks `count`, so it does not play the role
    assert_eq!(found, Ok(Some(json!({ "id": 1, "name": "ada" }))));
}

#[tokio::test]
async fn failing_service_does_not_fall_through_to_later_candidates() {
    let (ctx, _) = live_context();
    let second = CallLog::new();
    let log = second.clone();

    let backup = Service::new("backup")
        .method("find", move |_| {
            log.record("backup");
            Ok(json!({}))
        })
        .method("count", |_| Ok(json!(0)));
    let deps = vec![user_repo(vec![]), backup];

    let found = with_dependency_effect_handler(&ctx, deps, |ctx| async move {
        dependency_effect(&ctx, find(99)).await
    })
    .await
    .unwrap();

    assert_eq!(found, Ok(None));
    assert!(second.is_empty());
}

#[tokio::test]
async fn nested_scopes_fall_back_outward() {
    let (ctx, _) = live_context();
    let clock = Service::new("clock").quackable("now", "() => number".parse().unwrap(), |_| {
        Ok(json!(1700000000))
    });
    let users = user_repo(vec![(7, "grace")]);

    let (inner_hit, outer_hit, miss) =
        with_dependency_effect_handler(&ctx, vec![clock], |ctx| async move {
            with_dependency_effect_handler(&ctx, vec![users], |ctx| async move {
                let now_sig = Signature::try_from("() => number").unwrap();
                let now_role = Role::new().with("now", now_sig);
                let now = DependencyCall::new(now_role, Call::new("now", vec![]));
                let miss_role = Role::parse([("send", "(to: string) => void")]).unwrap();
                let send = DependencyCall::new(miss_role, Call::new("send", vec![json!("x")]));

                let inner_hit = dependency_effect(&ctx, find(7)).await;
                let outer_hit = dependency_effect(&ctx, now).await;
                let miss = dependency_effect(&ctx, send).await;
                (inner_hit, outer_hit, miss)
            })
            .await
            .unwrap()
        })
        .await
        .unwrap();

    assert_eq!(inner_hit, Ok(Some(json!({ "id": 7, "name": "grace" }))));
    assert_eq!(outer_hit, Ok(Some(json!(1700000000))));
    assert_eq!(miss, Ok(None));
}

#[tokio::test]
async fn inner_scope_shadows_outer_for_same_role() {
    let (ctx, _) = live_context();
    let outer = user_repo(vec![(1, "outer")]);
    let inner = user_repo(vec![(1, "inner")]);

    let found = with_dependency_effect_handler(&ctx, vec![outer], |ctx| async move {
        with_dependency_effect_handler(&ctx, vec![inner], |ctx| async move {
            dependency_effect(&ctx, find(1)).await
        })
        .await
        .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(found, Ok(Some(json!({ "id": 1, "name": "inner" }))));
}

#[tokio::test]
async fn concurrent_calls_each_resolve() {
    let (ctx, _) = live_context();
    let users = (1..=5).map(|id| (id, "someone")).collect();

    let results = with_dependency_effect_handler(&ctx, vec![user_repo(users)], |ctx| async move {
        let calls = (1..=5).map(|id| dependency_effect(&ctx, find(id)));
        futures::future::join_all(calls).await
    })
    .await
    .unwrap();

    let ids: Vec<Value> = results
        .into_iter()
        .map(|found| found.unwrap().unwrap()["id"].clone())
        .collect();
    assert_eq!(ids, (1..=5).map(|id| json!(id)).collect::<Vec<_>>());
}

/// Accepts only services whose name starts with a prefix.
#[derive(Debug)]
struct PrefixMatcher {
    prefix: &'static str,
    checks: Arc<AtomicUsize>,
}

impl DuckMatcher for PrefixMatcher {
    fn expect_role<'s>(
        &self,
        role: &Role,
        candidate: &'s Service,
    ) -> Result<RoleView<'s>, RoleMismatch> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if !candidate.name().starts_with(self.prefix) {
            return Err(RoleMismatch::new(candidate.name(), "name prefix not allowed"));
        }
        StructuralMatcher.expect_role(role, candidate)
    }
}

#[tokio::test]
async fn custom_matcher_decides_role_fit() {
    let (ctx, _) = live_context();
    let checks = Arc::new(AtomicUsize::new(0));
    let matcher = PrefixMatcher {
        prefix: "trusted",
        checks: checks.clone(),
    };
    let deps = vec![
        Service::new("shady")
            .method("find", |_| Ok(json!("shady")))
            .method("count", |_| Ok(json!(0))),
        Service::new("trusted-users")
            .method("find", |_| Ok(json!("trusted")))
            .method("count", |_| Ok(json!(0))),
    ];

    let found = with_dependency_effect_handler_using(&ctx, deps, matcher, |ctx| async move {
        dependency_effect(&ctx, find(1)).await
    })
    .await
    .unwrap();

    assert_eq!(found, Ok(Some(json!("trusted"))));
    assert_eq!(checks.load(Ordering::SeqCst), 2);
}
