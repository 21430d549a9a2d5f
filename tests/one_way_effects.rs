//! Integration tests for abortive and fire-and-forget effects.
//!
//! These tests verify delivery counts, ordering under backpressure, and that
//! teardown runs exactly once on every way a scope can end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backwater::prelude::*;
use backwater::testing::{live_context, CallLog};

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = count.clone();
    (count, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

// ============================================================================
// Abortive delivery
// ============================================================================

#[tokio::test]
async fn abortive_delivers_only_first_of_many_triggers() {
    let (ctx, _) = live_context();
    let calls = CallLog::new();
    let log = calls.clone();

    with_abortive_effect_handler(
        &ctx,
        "stop",
        move |_, payload: usize| {
            log.record(payload);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        },
        HandlerOptions::new().with_capacity(16),
        |ctx| async move {
            let triggers = (0..10usize).map(|n| abort_effect(&ctx, "stop", n));
            futures::future::join_all(triggers).await;
            ctx.lookup_token().unwrap().cancelled().await;
        },
    )
    .await
    .unwrap();

    assert_eq!(calls.calls(), vec![0]);
}

#[tokio::test]
async fn abortive_scope_ends_nested_fire_and_forget() {
    let (ctx, root) = live_context();
    let logged = CallLog::new();
    let (log, before) = (logged.clone(), logged.clone());

    with_abortive_effect_handler(
        &ctx,
        "stop",
        |_, _: ()| async {},
        HandlerOptions::new(),
        |ctx| async move {
            with_fire_and_forget_effect_handler(
                &ctx,
                "log",
                move |_, line: &'static str| {
                    log.record(line);
                    async {}
                },
                HandlerOptions::new(),
                |ctx| async move {
                    fire_and_forget_effect(&ctx, "log", "before").await.unwrap();
                    before.wait_for(1).await;
                    abort_effect(&ctx, "stop", ()).await.unwrap();
                    ctx.lookup_token().unwrap().cancelled().await;
                    fire_and_forget_effect(&ctx, "log", "after").await.unwrap();
                },
            )
            .await
            .unwrap();
        },
    )
    .await
    .unwrap();

    assert_eq!(logged.calls(), vec!["before"]);
    assert!(!root.is_cancelled());
}

// ============================================================================
// Fire-and-forget delivery
// ============================================================================

#[tokio::test]
async fn fire_and_forget_keeps_order_under_backpressure() {
    let (ctx, _) = live_context();
    let seen = CallLog::new();
    let log = seen.clone();

    with_fire_and_forget_effect_handler(
        &ctx,
        "count",
        move |_, n: u32| {
            log.record(n);
            async {
                tokio::task::yield_now().await;
            }
        },
        HandlerOptions::new().with_capacity(1),
        |ctx| async move {
            for n in 0..50u32 {
                fire_and_forget_effect(&ctx, "count", n).await.unwrap();
            }
        },
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(1), seen.wait_for(50))
        .await
        .unwrap();
    assert_eq!(seen.calls(), (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn fire_and_forget_trigger_returns_before_processing() {
    let (ctx, _) = live_context();
    let processed = CallLog::new();
    let log = processed.clone();

    let observed_during_thunk = with_fire_and_forget_effect_handler(
        &ctx,
        "slow",
        move |_, n: u8| {
            let log = log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                log.record(n);
            }
        },
        HandlerOptions::new(),
        |ctx| {
            let processed = processed.clone();
            async move {
                fire_and_forget_effect(&ctx, "slow", 1u8).await.unwrap();
                processed.len()
            }
        },
    )
    .await
    .unwrap();

    assert_eq!(observed_during_thunk, 0);
    // the closed scope still drains what was accepted
    tokio::time::timeout(Duration::from_secs(1), processed.wait_for(1))
        .await
        .unwrap();
    assert_eq!(processed.calls(), vec![1]);
}

// ============================================================================
// Scope exit while a handler is busy
// ============================================================================

#[tokio::test]
async fn installer_returns_while_handler_waits_for_later_ack() {
    let (ctx, _) = live_context();
    let (ack_tx, ack_rx) = tokio::sync::mpsc::channel::<()>(1);
    let ack_rx = Arc::new(tokio::sync::Mutex::new(ack_rx));
    let acked = CallLog::new();
    let log = acked.clone();

    let installed = with_fire_and_forget_effect_handler(
        &ctx,
        "publish",
        move |_, topic: &'static str| {
            let ack_rx = ack_rx.clone();
            let log = log.clone();
            async move {
                ack_rx.lock().await.recv().await;
                log.record(topic);
            }
        },
        HandlerOptions::new(),
        |ctx| async move { fire_and_forget_effect(&ctx, "publish", "orders").await },
    );
    let returned = tokio::time::timeout(Duration::from_secs(1), installed).await;
    assert!(returned.is_ok(), "installer waited on a busy handler");

    ack_tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), acked.wait_for(1))
        .await
        .unwrap();
    assert_eq!(acked.calls(), vec!["orders"]);
}

#[tokio::test]
async fn installer_returns_while_handler_listens_for_cancel() {
    let (ctx, root) = live_context();
    let stopped = CallLog::new();
    let log = stopped.clone();

    let installed = with_fire_and_forget_effect_handler(
        &ctx,
        "listen",
        move |token: CancelToken, _: ()| {
            let log = log.clone();
            async move {
                token.cancelled().await;
                log.record("stopped");
            }
        },
        HandlerOptions::new(),
        |ctx| async move { fire_and_forget_effect(&ctx, "listen", ()).await },
    );
    let returned = tokio::time::timeout(Duration::from_secs(1), installed).await;
    assert!(returned.is_ok(), "installer waited on a listening handler");
    assert!(stopped.is_empty());

    root.cancel();
    tokio::time::timeout(Duration::from_secs(1), stopped.wait_for(1))
        .await
        .unwrap();
}

// ============================================================================
// Teardown on every exit path
// ============================================================================

#[tokio::test]
async fn teardown_runs_once_when_thunk_returns() {
    let (ctx, _) = live_context();
    let (teardowns, teardown) = counter();

    with_abortive_effect_handler(
        &ctx,
        "stop",
        |_, _: ()| async {},
        HandlerOptions::new().with_teardown(teardown),
        |ctx| async move { abort_effect(&ctx, "stop", ()).await },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn teardown_runs_once_when_thunk_panics() {
    let (ctx, _) = live_context();
    let (teardowns, teardown) = counter();

    let joined = tokio::spawn(async move {
        with_fire_and_forget_effect_handler(
            &ctx,
            "log",
            |_, _: ()| async {},
            HandlerOptions::new().with_teardown(teardown),
            |_| async {
                panic!("thunk failed");
            },
        )
        .await
    })
    .await;

    assert!(joined.unwrap_err().is_panic());
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn teardown_runs_once_when_scope_is_dropped() {
    let (ctx, _) = live_context();
    let (teardowns, teardown) = counter();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        with_fire_and_forget_effect_handler(
            &ctx,
            "log",
            |_, _: ()| async {},
            HandlerOptions::new().with_teardown(teardown),
            |_| futures::future::pending::<()>(),
        ),
    )
    .await;

    assert!(timed_out.is_err());
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn teardown_runs_once_when_cancelled() {
    let (ctx, root) = live_context();
    let (teardowns, teardown) = counter();
    let delivered = CallLog::new();
    let log = delivered.clone();

    with_abortive_effect_handler(
        &ctx,
        "stop",
        move |_, n: u8| {
            log.record(n);
            async {}
        },
        HandlerOptions::new().with_teardown(teardown),
        |ctx| async move {
            root.cancel();
            abort_effect(&ctx, "stop", 1u8).await.unwrap();
        },
    )
    .await
    .unwrap();

    assert!(delivered.is_empty());
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}
