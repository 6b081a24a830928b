//! Quorum operations end to end: host values in, payloads out

use std::sync::{Arc, Mutex};

use quorum_bridge::config::NodeConfig;
use quorum_bridge::quorum::types::{AddPeersResult, ContentList, ContentQuery};
use quorum_bridge::quorum::ApiFuture;
use quorum_bridge::{
    build_runtime, build_runtime_with_host_loop, ArityPolicy, BridgeError, Call, HostValue,
    LogControl, MemoryNode, NativeError, QuorumApi, Runtime,
};
use tokio::runtime::Handle;

fn memory_node(peer_name: &str) -> Arc<MemoryNode> {
    Arc::new(MemoryNode::new(NodeConfig {
        peer_name: peer_name.to_string(),
        ping_latency_ms: 0,
        boot_addrs: Vec::new(),
    }))
}

fn memory_runtime(policy: ArityPolicy) -> Runtime {
    let (runtime, _lifecycle) = build_runtime(
        memory_node("operations"),
        LogControl::detached(false),
        Handle::current(),
        policy,
    );
    runtime
}

async fn start(runtime: &Runtime) {
    runtime
        .call("StartQuorum", &[HostValue::from("pw"), HostValue::from("")])
        .settle()
        .await
        .expect("start");
}

async fn started(policy: ArityPolicy) -> Runtime {
    let runtime = memory_runtime(policy);
    start(&runtime).await;
    runtime
}

async fn call(runtime: &Runtime, name: &str, args: &[HostValue]) -> Result<HostValue, BridgeError> {
    runtime.call(name, args).settle().await
}

fn keys(value: &HostValue) -> Vec<&str> {
    value
        .as_object()
        .expect("object payload")
        .keys()
        .map(String::as_str)
        .collect()
}

fn post(group_id: &str, content: &str) -> HostValue {
    HostValue::from(
        serde_json::json!({
            "type": "Add",
            "object": {"type": "Note", "content": content, "name": ""},
            "target": {"id": group_id, "type": "Group"},
        })
        .to_string(),
    )
}

#[tokio::test]
async fn test_payload_keys_are_result_fields() {
    let runtime = started(ArityPolicy::Decline).await;

    let seed = call(&runtime, "CreateGroup", &[HostValue::from(r#"{"group_name": "g"}"#)])
        .await
        .expect("create");
    let mut seed_keys = keys(&seed);
    seed_keys.sort_unstable();
    assert_eq!(
        seed_keys,
        vec![
            "app_key",
            "cipher_key",
            "consensus_type",
            "encryption_type",
            "genesis_block",
            "group_id",
            "group_name",
            "owner_pubkey",
            "signature",
        ]
    );
    assert_eq!(seed.get("consensus_type"), Some(&HostValue::from("poa")));

    let group_id = seed.get("group_id").and_then(HostValue::as_str).expect("group id");
    let posted = call(&runtime, "PostToGroup", &[post(group_id, "hi")]).await.unwrap();
    assert_eq!(keys(&posted), vec!["trx_id"]);

    let trx_id = posted.get("trx_id").cloned().unwrap();
    let trx = call(&runtime, "GetTrx", &[HostValue::from(group_id), trx_id]).await.unwrap();
    assert_eq!(trx.get("type"), Some(&HostValue::from("POST")));
    assert!(trx.get("kind").is_none());
}

#[tokio::test]
async fn test_group_seed_joins_on_another_node() {
    let alice = started(ArityPolicy::Decline).await;
    let seed = call(&alice, "CreateGroup", &[HostValue::from(r#"{"group_name": "g"}"#)])
        .await
        .expect("create");

    let timestamp = seed
        .get("genesis_block")
        .and_then(|block| block.get("timestamp"))
        .and_then(HostValue::as_str)
        .expect("timestamp is a decimal string");
    assert!(timestamp.parse::<i64>().expect("decimal") > 1_000_000_000_000_000_000);

    let (bob, _lifecycle) = build_runtime(
        memory_node("bob"),
        LogControl::detached(false),
        Handle::current(),
        ArityPolicy::Decline,
    );
    start(&bob).await;

    let seed_json = serde_json::to_string(&seed).unwrap();
    let joined = call(&bob, "JoinGroup", &[HostValue::from(seed_json)])
        .await
        .expect("join");
    assert_eq!(joined.get("group_id"), seed.get("group_id"));
    assert_eq!(joined.get("owner_pubkey"), seed.get("owner_pubkey"));
    assert_ne!(joined.get("user_pubkey"), seed.get("owner_pubkey"));
}

#[tokio::test]
async fn test_add_peers_lists_every_rejected_address() {
    let runtime = started(ArityPolicy::Decline).await;
    let result = call(
        &runtime,
        "AddPeers",
        &[HostValue::from("/ip4/1.2.3.4/tcp/1/p2p/p1,,,")],
    )
    .await
    .unwrap();

    assert_eq!(result.get("succ_count"), Some(&HostValue::Number(1.0)));
    assert_eq!(result.get("err_count"), Some(&HostValue::Number(3.0)));
    let errs = result.get("errs").and_then(HostValue::as_array).unwrap();
    assert_eq!(errs.len(), 3);
    for err in errs {
        assert_eq!(err.get("addr"), Some(&HostValue::from("")));
        assert_eq!(err.get("reason"), Some(&HostValue::from("empty address")));
    }
}

#[tokio::test]
async fn test_plain_runtime_keeps_no_settlements() {
    let (runtime, _lifecycle) = build_runtime(
        memory_node("plain"),
        LogControl::detached(false),
        Handle::current(),
        ArityPolicy::Decline,
    );
    assert!(!runtime.bridge().publishes_settlements());
    start(&runtime).await;
    for _ in 0..100 {
        call(&runtime, "GetNodeInfo", &[]).await.expect("node info");
    }
}

#[tokio::test]
async fn test_host_loop_runtime_publishes_settlements() {
    let (runtime, mut host_loop, _lifecycle) = build_runtime_with_host_loop(
        memory_node("looped"),
        LogControl::detached(false),
        Handle::current(),
        ArityPolicy::Decline,
    );
    assert!(runtime.bridge().publishes_settlements());
    start(&runtime).await;
    call(&runtime, "GetNodeInfo", &[]).await.expect("node info");

    let mut operations = Vec::new();
    while let Some(settlement) = host_loop.try_next() {
        operations.push(settlement.operation);
    }
    assert_eq!(operations, vec!["StartQuorum", "GetNodeInfo"]);
}

#[tokio::test]
async fn test_native_error_message_is_verbatim() {
    let runtime = started(ArityPolicy::Decline).await;
    let err = call(&runtime, "GetTrx", &[HostValue::from("x"), HostValue::from("t")])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "group not found: x");
    assert_eq!(err.kind(), "native");
}

#[tokio::test]
async fn test_operations_reject_before_start() {
    let runtime = memory_runtime(ArityPolicy::Decline);
    let err = call(&runtime, "GetGroups", &[]).await.unwrap_err();
    assert!(matches!(err, BridgeError::Native(NativeError::NotRunning)));
}

#[tokio::test]
async fn test_content_pages_through_posts() {
    let runtime = started(ArityPolicy::Decline).await;
    let seed = call(&runtime, "CreateGroup", &[HostValue::from(r#"{"group_name": "g"}"#)])
        .await
        .unwrap();
    let group_id = seed.get("group_id").and_then(HostValue::as_str).unwrap().to_string();
    for text in ["one", "two", "three"] {
        call(&runtime, "PostToGroup", &[post(&group_id, text)]).await.unwrap();
    }

    let page = call(
        &runtime,
        "GetContent",
        &[
            HostValue::from(group_id.as_str()),
            HostValue::Number(2.0),
            HostValue::from(""),
            HostValue::Bool(true),
        ],
    )
    .await
    .unwrap();
    let contents = page.get("contents").and_then(HostValue::as_array).unwrap();
    assert_eq!(contents.len(), 2);
    let text = |item: &HostValue| {
        item.get("content")
            .and_then(|c| c.get("content"))
            .and_then(HostValue::as_str)
            .map(str::to_string)
    };
    assert_eq!(text(&contents[0]).as_deref(), Some("three"));
    assert_eq!(text(&contents[1]).as_deref(), Some("two"));
}

#[tokio::test]
async fn test_type_error_rejects() {
    let runtime = started(ArityPolicy::Decline).await;
    let err = call(&runtime, "GetTrx", &[HostValue::from("g"), HostValue::Number(1.0)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "type");
}

#[tokio::test]
async fn test_too_few_arguments_is_declined() {
    let runtime = started(ArityPolicy::Decline).await;
    assert!(matches!(
        runtime.call("GetTrx", &[HostValue::from("g")]),
        Call::Immediate(HostValue::Null)
    ));
    assert!(matches!(runtime.call("SetDebug", &[]), Call::Immediate(HostValue::Null)));
}

#[tokio::test]
async fn test_too_few_arguments_rejects_under_reject_policy() {
    let runtime = started(ArityPolicy::Reject).await;
    let err = call(&runtime, "GetTrx", &[HostValue::from("g")]).await.unwrap_err();
    assert_eq!(err.kind(), "arity");
}

#[tokio::test]
async fn test_set_debug_and_storage_probe_return_immediately() {
    let runtime = started(ArityPolicy::Decline).await;
    assert!(matches!(
        runtime.call("SetDebug", &[HostValue::Bool(true)]),
        Call::Immediate(HostValue::Bool(true))
    ));
    assert!(matches!(
        runtime.call("StorageSelfTest", &[]),
        Call::Immediate(HostValue::Bool(true))
    ));
}

/// Records what the bindings hand to the node.
#[derive(Default)]
struct Recorder {
    queries: Mutex<Vec<ContentQuery>>,
    peers: Mutex<Vec<Vec<String>>>,
}

impl QuorumApi for Recorder {
    fn get_content(&self, query: ContentQuery) -> ApiFuture<ContentList> {
        self.queries.lock().unwrap().push(query);
        Box::pin(async { Ok(ContentList { contents: Vec::new() }) })
    }

    fn add_peers(&self, peers: Vec<String>) -> ApiFuture<AddPeersResult> {
        let succ_count = peers.len() as u32;
        self.peers.lock().unwrap().push(peers);
        Box::pin(async move {
            Ok(AddPeersResult {
                succ_count,
                ..Default::default()
            })
        })
    }
}

fn recording_runtime(recorder: Arc<Recorder>) -> Runtime {
    let (runtime, _lifecycle) = build_runtime(
        recorder,
        LogControl::detached(false),
        Handle::current(),
        ArityPolicy::Decline,
    );
    runtime
}

#[tokio::test]
async fn test_get_content_arguments_reach_the_node_in_order() {
    let recorder = Arc::new(Recorder::default());
    let runtime = recording_runtime(Arc::clone(&recorder));

    let result = call(
        &runtime,
        "GetContent",
        &[
            HostValue::from("g1"),
            HostValue::Number(10.0),
            HostValue::from(""),
            HostValue::Bool(false),
            HostValue::from("alice"),
            HostValue::from("bob"),
        ],
    )
    .await
    .unwrap();
    assert_eq!(result.get("contents"), Some(&HostValue::Array(Vec::new())));

    assert_eq!(
        *recorder.queries.lock().unwrap(),
        vec![ContentQuery {
            group_id: "g1".to_string(),
            num: 10,
            start_trx: String::new(),
            reverse: false,
            senders: vec!["alice".to_string(), "bob".to_string()],
        }]
    );
}

#[tokio::test]
async fn test_add_peers_receives_split_list() {
    let recorder = Arc::new(Recorder::default());
    let runtime = recording_runtime(Arc::clone(&recorder));

    let result = call(&runtime, "AddPeers", &[HostValue::from("addr1,addr2,addr3")])
        .await
        .unwrap();
    assert_eq!(result.get("succ_count"), Some(&HostValue::Number(3.0)));
    assert_eq!(result.get("errs"), Some(&HostValue::Array(Vec::new())));
    assert_eq!(
        *recorder.peers.lock().unwrap(),
        vec![vec!["addr1".to_string(), "addr2".to_string(), "addr3".to_string()]]
    );
}

#[tokio::test]
async fn test_unimplemented_operation_rejects() {
    let runtime = recording_runtime(Arc::new(Recorder::default()));
    let err = call(&runtime, "GetGroups", &[]).await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Native(NativeError::Unsupported("get_groups"))
    ));
}

#[tokio::test]
async fn test_unknown_operation_rejects() {
    let runtime = recording_runtime(Arc::new(Recorder::default()));
    let err = call(&runtime, "Nope", &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "operation not found: Nope");
}
