//! Integration tests for fallback dispatch and health tracking

mod common;

use aura_core::protocol::CanonicalRequest;
use aura_core::providers::FailureKind;
use aura_core::registry::{AttemptOutcome, HealthStatus};
use aura_core::routing::{DispatchConfig, DispatchError, Dispatcher, PermanentErrorPolicy};
use common::{registry, registry_with_cooldown, ScriptedProvider, Step};
use std::sync::Arc;
use std::time::Duration;

fn dispatcher(registry: Arc<aura_core::ProviderRegistry>) -> Dispatcher {
    Dispatcher::new(
        registry,
        DispatchConfig {
            default_timeout: Duration::from_secs(5),
            on_permanent_error: PermanentErrorPolicy::Abort,
            cancel_grace: Duration::from_millis(200),
        },
    )
}

fn outcomes(err: &DispatchError) -> Vec<AttemptOutcome> {
    err.attempts().iter().map(|a| a.outcome).collect()
}

#[tokio::test]
async fn test_first_healthy_candidate_serves() {
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Reply("from a")]);
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("from b")]);
    let dispatcher = dispatcher(registry(2, &[(a.clone(), 1), (b.clone(), 2)]));

    let response = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();

    assert_eq!(response.provider_id, "A");
    assert_eq!(response.text, "from a");
    assert_eq!(response.model, "m");
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_transient_falls_back_and_demotes() {
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Fail(FailureKind::Transient)]);
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("ok")]);
    let dispatcher = dispatcher(registry(1, &[(a.clone(), 1), (b.clone(), 2)]));

    let response = dispatcher
        .dispatch(&CanonicalRequest::new("hi").with_model_hint("m"))
        .await
        .unwrap();

    assert_eq!(response.provider_id, "B");
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Degraded));
    assert_eq!(dispatcher.registry().health("B"), Some(HealthStatus::Healthy));
}

#[tokio::test]
async fn test_all_rate_limited() {
    let providers: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|id| ScriptedProvider::new(id, &["m"], vec![Step::Fail(FailureKind::RateLimited)]))
        .collect();
    let entries: Vec<_> = providers.iter().map(|p| (p.clone(), 1)).collect();
    let dispatcher = dispatcher(registry(2, &entries));

    let err = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap_err();

    assert!(matches!(err, DispatchError::AllProvidersFailed { .. }));
    assert_eq!(outcomes(&err), vec![AttemptOutcome::RateLimited; 3]);
    assert!(!err.is_timeout());
    for id in ["A", "B", "C"] {
        assert_eq!(dispatcher.registry().health(id), Some(HealthStatus::Unavailable));
    }
}

#[tokio::test]
async fn test_two_transients_demote_then_success_restores() {
    let a = ScriptedProvider::new(
        "A",
        &["m"],
        vec![
            Step::Fail(FailureKind::Transient),
            Step::Fail(FailureKind::Transient),
            Step::Reply("back"),
        ],
    );
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("spare")]);
    let dispatcher = dispatcher(registry(2, &[(a.clone(), 1), (b.clone(), 2)]));
    let request = CanonicalRequest::new("hi");

    dispatcher.dispatch(&request).await.unwrap();
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Healthy));

    dispatcher.dispatch(&request).await.unwrap();
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Degraded));

    let response = dispatcher.dispatch(&request).await.unwrap();
    assert_eq!(response.provider_id, "A");
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Healthy));
    assert_eq!(a.calls(), 3);
}

#[tokio::test]
async fn test_budget_exhausted_mid_attempt() {
    let slow = ScriptedProvider::new(
        "slow",
        &["m"],
        vec![Step::ReplyAfter(Duration::from_secs(10), "too late")],
    );
    let spare = ScriptedProvider::new("spare", &["m"], vec![Step::Reply("unused")]);
    let dispatcher = dispatcher(registry(2, &[(slow.clone(), 1), (spare.clone(), 2)]));

    let request = CanonicalRequest::new("hi").with_timeout(Duration::from_millis(100));
    let started = std::time::Instant::now();
    let err = dispatcher.dispatch(&request).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(err.is_timeout());
    assert_eq!(err.attempts().len(), 1);
    assert_eq!(err.attempts()[0].provider_id, "slow");
    assert_eq!(err.attempts()[0].outcome, AttemptOutcome::Timeout);
    assert!(slow.saw_cancel());
    assert_eq!(spare.calls(), 0);
}

#[tokio::test]
async fn test_budget_spent_before_next_attempt() {
    let stalled = ScriptedProvider::new(
        "stalled",
        &["m"],
        vec![Step::StallThenFail(Duration::from_millis(150), FailureKind::Transient)],
    );
    let spare = ScriptedProvider::new("spare", &["m"], vec![Step::Reply("unused")]);
    let dispatcher = dispatcher(registry(2, &[(stalled.clone(), 1), (spare.clone(), 2)]));

    let request = CanonicalRequest::new("hi").with_timeout(Duration::from_millis(50));
    let err = dispatcher.dispatch(&request).await.unwrap_err();

    // The stalled attempt completed on its own, so it keeps its real outcome
    assert!(matches!(
        err,
        DispatchError::AllProvidersFailed {
            budget_exhausted: true,
            ..
        }
    ));
    assert!(err.is_timeout());
    assert_eq!(outcomes(&err), vec![AttemptOutcome::TransientError]);
    assert!(!stalled.saw_cancel());
    assert_eq!(spare.calls(), 0);
}

#[tokio::test]
async fn test_provider_returns_after_cooldown() {
    let a = ScriptedProvider::new(
        "A",
        &["m"],
        vec![Step::Fail(FailureKind::RateLimited), Step::Reply("a is back")],
    );
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("b")]);
    let dispatcher = dispatcher(registry_with_cooldown(
        2,
        Duration::from_millis(50),
        &[(a.clone(), 1), (b.clone(), 2)],
    ));

    let first = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();
    assert_eq!(first.provider_id, "B");
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Unavailable));

    let cooling = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();
    assert_eq!(cooling.provider_id, "B");
    assert_eq!(a.calls(), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let after = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();
    assert_eq!(after.provider_id, "A");
    assert_eq!(after.text, "a is back");
    assert_eq!(a.calls(), 2);
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Healthy));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_keeps_health_consistent() {
    const REQUESTS: usize = 64;
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Fail(FailureKind::Transient)]);
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("b")]);
    let dispatcher = Arc::new(dispatcher(registry(2, &[(a.clone(), 1), (b.clone(), 2)])));

    let handles: Vec<_> = (0..REQUESTS)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .dispatch(&CanonicalRequest::new(format!("request {}", i)))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.provider_id, "B");
    }

    // Priority outranks health, so every request tried A first
    assert_eq!((a.calls(), b.calls()), (REQUESTS, REQUESTS));
    let snapshot = dispatcher.registry().snapshot();
    assert_eq!(snapshot[0].id, "A");
    assert_eq!(snapshot[0].health, HealthStatus::Degraded);
    assert_eq!(snapshot[0].consecutive_failures, REQUESTS as u32);
    assert_eq!(snapshot[1].health, HealthStatus::Healthy);
    assert_eq!(snapshot[1].consecutive_failures, 0);
}

#[tokio::test]
async fn test_unavailable_skipped_unless_only_match() {
    let a = ScriptedProvider::new(
        "A",
        &["m", "a-only"],
        vec![Step::Fail(FailureKind::RateLimited), Step::Reply("a again")],
    );
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("b")]);
    let dispatcher = dispatcher(registry(2, &[(a.clone(), 1), (b.clone(), 2)]));

    dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Unavailable));

    let candidates = dispatcher.registry().list_candidates(Some("m"));
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id(), "B");

    let response = dispatcher
        .dispatch(&CanonicalRequest::new("hi").with_model_hint("a-only"))
        .await
        .unwrap();
    assert_eq!(response.provider_id, "A");
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_permanent_error_aborts_by_default() {
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Fail(FailureKind::Permanent)]);
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("b")]);
    let dispatcher = dispatcher(registry(2, &[(a.clone(), 1), (b.clone(), 2)]));

    let err = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap_err();

    match &err {
        DispatchError::PermanentFailure { provider_id, .. } => assert_eq!(provider_id, "A"),
        other => panic!("Expected PermanentFailure, got {:?}", other),
    }
    assert_eq!(outcomes(&err), vec![AttemptOutcome::PermanentError]);
    assert_eq!(b.calls(), 0);
    assert_eq!(dispatcher.registry().health("A"), Some(HealthStatus::Healthy));
}

#[tokio::test]
async fn test_permanent_error_fallback_policy() {
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Fail(FailureKind::Permanent)]);
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("b")]);
    let dispatcher = Dispatcher::new(
        registry(2, &[(a.clone(), 1), (b.clone(), 2)]),
        DispatchConfig {
            on_permanent_error: PermanentErrorPolicy::Fallback,
            ..DispatchConfig::default()
        },
    );

    let response = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();
    assert_eq!(response.provider_id, "B");
}

#[tokio::test]
async fn test_no_provider_for_hint() {
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Reply("a")]);
    let dispatcher = dispatcher(registry(2, &[(a.clone(), 1)]));

    let err = dispatcher
        .dispatch(&CanonicalRequest::new("hi").with_model_hint("unknown-model"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "no_provider_available");
    assert!(err.attempts().is_empty());
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_each_provider_tried_once() {
    let a = ScriptedProvider::new("A", &["m"], vec![Step::Fail(FailureKind::Transient)]);
    let b = ScriptedProvider::new("B", &["m"], vec![Step::Fail(FailureKind::Timeout)]);
    let dispatcher = dispatcher(registry(2, &[(a.clone(), 1), (b.clone(), 2)]));

    let err = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap_err();

    assert_eq!(
        outcomes(&err),
        vec![AttemptOutcome::TransientError, AttemptOutcome::Timeout]
    );
    // The last attempt timed out, so callers see a timeout
    assert!(err.is_timeout());
    assert_eq!((a.calls(), b.calls()), (1, 1));
}

mod scenario_a_b {
    use super::*;

    async fn run(degrade_after: u32) -> (String, String, Option<HealthStatus>) {
        let a = ScriptedProvider::new("A", &["m"], vec![Step::Fail(FailureKind::Timeout)]);
        let b = ScriptedProvider::new("B", &["m"], vec![Step::Reply("hello")]);
        let dispatcher = dispatcher(registry(degrade_after, &[(a, 1), (b, 2)]));

        let response = dispatcher.dispatch(&CanonicalRequest::new("hi")).await.unwrap();
        (
            response.text,
            response.provider_id,
            dispatcher.registry().health("A"),
        )
    }

    #[tokio::test]
    async fn test_threshold_one_degrades_immediately() {
        let (text, provider_id, health) = run(1).await;
        assert_eq!(text, "hello");
        assert_eq!(provider_id, "B");
        assert_eq!(health, Some(HealthStatus::Degraded));
    }

    #[tokio::test]
    async fn test_threshold_two_needs_second_failure() {
        let (text, provider_id, health) = run(2).await;
        assert_eq!(text, "hello");
        assert_eq!(provider_id, "B");
        assert_eq!(health, Some(HealthStatus::Healthy));
    }
}
