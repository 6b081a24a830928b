//! Settlement delivery through the host loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quorum_bridge::runtime::{AsyncBridge, DeferredStatus};
use quorum_bridge::{HostValue, Payload};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

fn payload(key: &str, value: HostValue) -> Payload {
    let mut payload = Payload::new();
    payload.insert(key.to_string(), value);
    payload
}

#[tokio::test]
async fn test_settlements_arrive_in_completion_order() {
    let (bridge, mut host_loop) = AsyncBridge::with_settlements(Handle::current());
    let (release, gate) = oneshot::channel::<()>();

    let slow = bridge.invoke(
        "Slow",
        Box::pin(async move {
            let _ = gate.await;
            Ok(payload("slow", HostValue::Bool(true)))
        }),
    );
    let fast = bridge.invoke(
        "Fast",
        Box::pin(async { Ok(payload("fast", HostValue::Bool(true))) }),
    );
    assert!(slow.call_id() < fast.call_id());

    let first = host_loop.next().await.expect("first settlement");
    assert_eq!(first.operation, "Fast");
    assert_eq!(first.call_id, fast.call_id());
    assert_eq!(slow.status(), DeferredStatus::Pending);

    release.send(()).expect("slow task is waiting");
    let second = host_loop.next().await.expect("second settlement");
    assert_eq!(second.operation, "Slow");
    assert!(second.outcome.is_ok());

    assert_eq!(slow.await.unwrap().get("slow"), Some(&HostValue::Bool(true)));
    assert_eq!(fast.await.unwrap().get("fast"), Some(&HostValue::Bool(true)));
}

#[tokio::test]
async fn test_dropped_deferred_still_runs_to_completion() {
    let (bridge, mut host_loop) = AsyncBridge::with_settlements(Handle::current());
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    drop(bridge.invoke(
        "Detached",
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(Payload::new())
        }),
    ));

    let settlement = host_loop.next().await.expect("settlement");
    assert_eq!(settlement.operation, "Detached");
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_drain_handles_each_settlement_once() {
    let (bridge, mut host_loop) = AsyncBridge::with_settlements(Handle::current());
    let deferreds: Vec<_> = (0..8)
        .map(|i| {
            bridge.invoke(
                "Count",
                Box::pin(async move { Ok(payload("i", HostValue::Number(i as f64))) }),
            )
        })
        .collect();

    let mut seen = Vec::new();
    let handled = host_loop
        .drain(deferreds.len(), |settlement| seen.push(settlement.call_id))
        .await;
    assert_eq!(handled, 8);

    seen.sort_unstable();
    let mut expected: Vec<u64> = deferreds.iter().map(|d| d.call_id()).collect();
    expected.sort_unstable();
    assert_eq!(seen, expected);
    assert!(host_loop.try_next().is_none());
    assert!(deferreds.iter().all(|d| d.status() == DeferredStatus::Resolved));
}

#[tokio::test]
async fn test_rejections_are_published_too() {
    let (bridge, mut host_loop) = AsyncBridge::with_settlements(Handle::current());
    let deferred = bridge.reject_now(
        "Missing",
        quorum_bridge::BridgeError::NotFound("Missing".into()),
    );
    assert_eq!(deferred.status(), DeferredStatus::Rejected);

    let settlement = host_loop.try_next().expect("queued synchronously");
    assert_eq!(settlement.call_id, deferred.call_id());
    assert!(settlement.outcome.is_err());
}
