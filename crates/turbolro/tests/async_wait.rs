//! Integration tests for async waiting and the tokio spawner

mod common;

use assert_matches::assert_matches;
use common::value_of;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use turbolro::testing::{CountingSpawner, Gate, ScriptedOutcome, ScriptedStrategy};
use turbolro::{LroPoller, NoPolling, PollerConfig, PollingError, TokioSpawner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_result_async() {
    let poller = LroPoller::new(
        (),
        json!({"value": 21}),
        value_of(),
        ScriptedStrategy::new(3).with_step_delay(Duration::from_millis(5)),
    )
    .unwrap();

    assert_eq!(poller.result_async(None).await.unwrap(), 21);
    assert!(poller.done());
}

#[tokio::test]
async fn test_wait_async_on_finished_poller() {
    let poller =
        LroPoller::new((), json!({"value": 2}), value_of(), NoPolling::new()).unwrap();

    poller.wait_async(Some(Duration::ZERO)).await.unwrap();
    assert_eq!(poller.result_async(None).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_async_timeout() {
    let gate = Gate::closed();
    let poller = LroPoller::new(
        (),
        json!({"value": 4}),
        value_of(),
        ScriptedStrategy::new(1).with_gate(gate.clone()),
    )
    .unwrap();

    poller
        .wait_async(Some(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(!poller.done());

    let err = poller
        .result_async(Some(Duration::from_millis(20)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    gate.open();
    assert_eq!(poller.result_async(None).await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_async_surfaces_failure() {
    let poller = LroPoller::new(
        (),
        json!({"value": 4}),
        value_of(),
        ScriptedStrategy::new(1).with_outcome(ScriptedOutcome::FailOperation("disk full".into())),
    )
    .unwrap();

    let err = poller.wait_async(None).await.unwrap_err();
    assert_matches!(err, PollingError::Operation(e) if e.message == "disk full");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_runs_pollers_on_blocking_pool() {
    let spawner = CountingSpawner::wrapping(Arc::new(TokioSpawner::current().unwrap()));
    let config = PollerConfig::builder()
        .spawner(Arc::new(spawner.clone()))
        .build();

    let pollers: Vec<_> = (0..4)
        .map(|value| {
            LroPoller::with_config(
                (),
                json!({ "value": value }),
                value_of(),
                ScriptedStrategy::new(2).with_step_delay(Duration::from_millis(2)),
                config.clone(),
            )
            .unwrap()
        })
        .collect();

    for (value, poller) in pollers.iter().enumerate() {
        assert_eq!(poller.result_async(None).await.unwrap(), value as i64);
    }
    assert_eq!(spawner.spawned(), 4);
}

#[test]
fn test_blocking_wait_alongside_async_waiters() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let gate = Gate::closed();
    let poller = LroPoller::new(
        (),
        json!({"value": 6}),
        value_of(),
        ScriptedStrategy::new(1).with_gate(gate.clone()),
    )
    .unwrap();

    let async_poller = poller.clone();
    let waiter = runtime.spawn(async move { async_poller.result_async(None).await });

    gate.open();
    assert_eq!(poller.result(None).unwrap(), 6);
    assert_eq!(runtime.block_on(waiter).unwrap().unwrap(), 6);
}
