//! Fire-and-forget effects.
//!
//! The handler sees every payload, in submission order, until the inherited
//! token is cancelled. Triggers only wait for the payload to be queued.

use std::future::Future;

use crate::context::EffectContext;
use crate::error::EffectError;
use crate::scope::{install, HandlerOptions, Scope};
use crate::token::CancelToken;

/// Install a handler for `effect_name` that processes any number of
/// payloads, then run `thunk` with it.
///
/// Fails with `MissingToken` if `pctx` carries no cancellation token.
///
/// # Example
///
/// ```
/// use backwater::prelude::*;
///
/// # tokio_test::block_on(async {
/// let ctx = EffectContext::empty().with_cancellation(CancelToken::new());
///
/// with_fire_and_forget_effect_handler(
///     &ctx,
///     "log",
///     |_token, line: String| async move { println!("{}", line) },
///     HandlerOptions::new(),
///     |ctx| async move {
///         fire_and_forget_effect(&ctx, "log", "step 1".to_string()).await?;
///         fire_and_forget_effect(&ctx, "log", "step 2".to_string()).await
///     },
/// )
/// .await
/// .unwrap()
/// .unwrap();
/// # });
/// ```
pub async fn with_fire_and_forget_effect_handler<P, H, HFut, F, Fut, T>(
    pctx: &EffectContext,
    effect_name: impl Into<String>,
    handle_event: H,
    options: HandlerOptions,
    thunk: F,
) -> Result<T, EffectError>
where
    P: Send + 'static,
    H: Fn(CancelToken, P) -> HFut + Send + Sync + 'static,
    HFut: Future<Output = ()> + Send + 'static,
    F: FnOnce(EffectContext) -> Fut,
    Fut: Future<Output = T>,
{
    let token = pctx.lookup_token()?;
    let scope = Scope {
        kind: "fire_and_forget",
        name: effect_name.into(),
        parent: pctx,
        daemon_token: token,
        scope_token: None,
    };
    Ok(install(scope, options, handle_event, thunk).await)
}

/// Queue `payload` for the handler bound to `name`.
///
/// Resolves once the payload is accepted, not once it is processed. After
/// cancellation the payload is silently dropped.
pub async fn fire_and_forget_effect<P>(
    ctx: &EffectContext,
    name: &str,
    payload: P,
) -> Result<(), EffectError>
where
    P: Send + 'static,
{
    let daemon = ctx.lookup_handler::<P>(name)?;
    if let Err(rejected) = daemon.push_event(payload).await {
        tracing::debug!(effect = name, "payload dropped: {}", rejected);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{live_context, CallLog};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_processes_pushed_event() {
        let (ctx, _) = live_context();
        let spy = CallLog::new();
        let log = spy.clone();

        with_fire_and_forget_effect_handler(
            &ctx,
            "log",
            move |_, payload: String| {
                log.record(payload);
                async {}
            },
            HandlerOptions::new(),
            |ctx| async move { fire_and_forget_effect(&ctx, "log", "hello".to_string()).await },
        )
        .await
        .unwrap()
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), spy.wait_for(1))
            .await
            .unwrap();
        assert_eq!(spy.calls(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_processes_many_in_order() {
        let (ctx, _) = live_context();
        let spy = CallLog::new();
        let log = spy.clone();

        with_fire_and_forget_effect_handler(
            &ctx,
            "count",
            move |_, n: usize| {
                log.record(n);
                async {}
            },
            HandlerOptions::new().with_capacity(2),
            |ctx| async move {
                for n in 0..20usize {
                    fire_and_forget_effect(&ctx, "count", n).await.unwrap();
                }
            },
        )
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), spy.wait_for(20))
            .await
            .unwrap();
        assert_eq!(spy.calls(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_does_not_process_after_cancel() {
        let (ctx, root) = live_context();
        let spy = CallLog::new();
        let log = spy.clone();

        with_fire_and_forget_effect_handler(
            &ctx,
            "noop",
            move |_, payload: &'static str| {
                log.record(payload);
                async {}
            },
            HandlerOptions::new(),
            |ctx| async move {
                root.cancel();
                fire_and_forget_effect(&ctx, "noop", "won't be processed").await
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert!(spy.is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_push_after_cancel_is_logged() {
        let (ctx, root) = live_context();

        with_fire_and_forget_effect_handler(
            &ctx,
            "audit",
            |_, _: u32| async {},
            HandlerOptions::new(),
            |ctx| async move {
                root.cancel();
                fire_and_forget_effect(&ctx, "audit", 1u32).await
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert!(logs_contain("payload dropped: daemon cancelled"));
    }

    #[tokio::test]
    async fn test_returns_while_handler_is_busy() {
        let (ctx, _) = live_context();
        let (ack_tx, ack_rx) = tokio::sync::mpsc::channel::<()>(1);
        let ack_rx = Arc::new(tokio::sync::Mutex::new(ack_rx));
        let spy = CallLog::new();
        let log = spy.clone();

        let installed = with_fire_and_forget_effect_handler(
            &ctx,
            "ack",
            move |_, n: u8| {
                let ack_rx = ack_rx.clone();
                let log = log.clone();
                async move {
                    ack_rx.lock().await.recv().await;
                    log.record(n);
                }
            },
            HandlerOptions::new(),
            |ctx| async move { fire_and_forget_effect(&ctx, "ack", 1u8).await },
        );
        tokio::time::timeout(Duration::from_secs(1), installed)
            .await
            .expect("installer waited on a busy handler")
            .unwrap()
            .unwrap();

        // the ack only exists once the scope has returned
        ack_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), spy.wait_for(1))
            .await
            .unwrap();
        assert_eq!(spy.calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_calls_teardown_after_thunk() {
        let (ctx, _) = live_context();
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = torn_down.clone();

        with_fire_and_forget_effect_handler(
            &ctx,
            "log",
            |_, _: String| async {},
            HandlerOptions::new().with_teardown(move || flag.store(true, Ordering::SeqCst)),
            |_| async {},
        )
        .await
        .unwrap();

        assert!(torn_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_handler_unbound_after_scope() {
        let (ctx, _) = live_context();
        let inner = with_fire_and_forget_effect_handler(
            &ctx,
            "log",
            |_, _: String| async {},
            HandlerOptions::new(),
            |ctx| async move { ctx },
        )
        .await
        .unwrap();

        assert!(!ctx.contains("log"));
        // the escaped context still names the handler, but its daemon is closed
        assert!(inner.contains("log"));
        fire_and_forget_effect(&inner, "log", "late".to_string())
            .await
            .unwrap();
    }
}
