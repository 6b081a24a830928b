//! Start, query and stop through the host-visible operations

use std::sync::Arc;

use quorum_bridge::config::NodeConfig;
use quorum_bridge::runtime::ServiceState;
use quorum_bridge::{
    build_runtime, ArityPolicy, BridgeError, Call, HostValue, Lifecycle, LogControl, MemoryNode,
    Runtime,
};
use tokio::runtime::Handle;

fn node() -> Arc<MemoryNode> {
    Arc::new(MemoryNode::new(NodeConfig {
        peer_name: "lifecycle".to_string(),
        ping_latency_ms: 0,
        boot_addrs: Vec::new(),
    }))
}

fn setup(node: Arc<MemoryNode>) -> (Runtime, Arc<Lifecycle>) {
    build_runtime(
        node,
        LogControl::detached(false),
        Handle::current(),
        ArityPolicy::Decline,
    )
}

fn is_running(runtime: &Runtime) -> bool {
    match runtime.call("IsQuorumRunning", &[]) {
        Call::Immediate(HostValue::Bool(running)) => running,
        other => panic!("unexpected IsQuorumRunning result: {:?}", other),
    }
}

fn start_args(password: &str) -> Vec<HostValue> {
    vec![HostValue::from(password), HostValue::from("")]
}

async fn wait_offline(node: &MemoryNode) {
    for _ in 0..100 {
        if !node.is_online() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("node stayed online after shutdown");
}

#[tokio::test]
async fn test_running_flag_follows_start_and_stop() {
    let node = node();
    let (runtime, lifecycle) = setup(Arc::clone(&node));

    assert!(!is_running(&runtime));

    let start = runtime.call("StartQuorum", &start_args("secret"));
    assert!(start.is_pending());
    // Starting counts as running from the host's point of view.
    assert!(is_running(&runtime));

    let result = start.settle().await.expect("start");
    assert_eq!(result.get("ok"), Some(&HostValue::Bool(true)));
    assert_eq!(lifecycle.state(), ServiceState::Running);
    assert!(is_running(&runtime));
    assert!(node.is_online());

    let stopped = runtime.call("StopQuorum", &[]);
    assert!(matches!(stopped, Call::Immediate(HostValue::Bool(true))));
    assert!(!is_running(&runtime));
    wait_offline(&node).await;
}

#[tokio::test]
async fn test_redundant_start_is_rejected() {
    let (runtime, lifecycle) = setup(node());

    runtime
        .call("StartQuorum", &start_args("secret"))
        .settle()
        .await
        .expect("first start");

    let err = runtime
        .call("StartQuorum", &start_args("secret"))
        .settle()
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Lifecycle(_)));
    assert_eq!(err.to_string(), "service is already running");
    assert_eq!(lifecycle.state(), ServiceState::Running);
}

#[tokio::test]
async fn test_failed_start_returns_to_stopped() {
    let (runtime, lifecycle) = setup(node());

    let err = runtime
        .call("StartQuorum", &start_args(""))
        .settle()
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid payload: password is required");
    assert_eq!(lifecycle.state(), ServiceState::Stopped);
    assert!(!is_running(&runtime));

    // A later start is not blocked by the failed one.
    let result = runtime
        .call("StartQuorum", &start_args("secret"))
        .settle()
        .await
        .expect("retry");
    assert_eq!(result.get("ok"), Some(&HostValue::Bool(true)));
}

#[tokio::test]
async fn test_stop_when_stopped_is_a_noop() {
    let (runtime, lifecycle) = setup(node());
    assert!(matches!(
        runtime.call("StopQuorum", &[]),
        Call::Immediate(HostValue::Bool(true))
    ));
    assert_eq!(lifecycle.state(), ServiceState::Stopped);
}

#[tokio::test]
async fn test_restart_after_stop() {
    let node = node();
    let (runtime, _lifecycle) = setup(Arc::clone(&node));

    runtime.call("StartQuorum", &start_args("secret")).settle().await.unwrap();
    runtime.call("StopQuorum", &[]);
    wait_offline(&node).await;

    runtime.call("StartQuorum", &start_args("secret")).settle().await.unwrap();
    assert!(node.is_online());
    // The first session's watcher must not take the second one offline.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(node.is_online());
}
