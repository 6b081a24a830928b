//! Quorum node bindings
//!
//! The operation table: each host-visible name with its signature and the
//! [`QuorumApi`] method it calls. Lifecycle operations and `SetDebug` are
//! synchronous; everything else returns a deferred payload.

mod api;
mod memory;
pub mod types;

pub use api::{ApiFuture, NativeError, QuorumApi};
pub use memory::MemoryNode;

use std::sync::Arc;

use host_value::HostValue;
use serde::Serialize;

use crate::abi::{AdaptError, Args, Signature};
use crate::error::BridgeError;
use crate::logging::LogControl;
use crate::runtime::{
    ArityPolicy, AsyncBridge, HostLoop, Lifecycle, OperationProvider, Registry, Runtime,
};
use tokio::runtime::Handle;
use types::{ContentQuery, StartResult};

/// Every operation name [`QuorumBindings`] registers.
pub const OPERATIONS: &[&str] = &[
    "SetDebug",
    "StartQuorum",
    "IsQuorumRunning",
    "StopQuorum",
    "StartSync",
    "Announce",
    "GetGroupProducers",
    "GetAnnouncedGroupProducers",
    "GetAnnouncedGroupUsers",
    "GroupProducer",
    "AddPeers",
    "CreateGroup",
    "MgrGrpBlkList",
    "GetDeniedUserList",
    "Ping",
    "UpdateProfile",
    "GetTrx",
    "PostToGroup",
    "GetNodeInfo",
    "GetNetwork",
    "GetContent",
    "JoinGroup",
    "LeaveGroup",
    "ClearGroupData",
    "GetGroups",
    "GetBlockById",
    "GetDecodedBlockById",
    "StorageSelfTest",
];

/// Binds a [`QuorumApi`] to host operation names.
#[derive(Clone)]
pub struct QuorumBindings {
    api: Arc<dyn QuorumApi>,
    lifecycle: Arc<Lifecycle>,
    logs: LogControl,
    spawner: AsyncBridge,
}

impl QuorumBindings {
    /// `spawner` runs the detached storage probe; pass the bridge the
    /// runtime uses.
    pub fn new(
        api: Arc<dyn QuorumApi>,
        lifecycle: Arc<Lifecycle>,
        logs: LogControl,
        spawner: AsyncBridge,
    ) -> Self {
        Self {
            api,
            lifecycle,
            logs,
            spawner,
        }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Register an async operation that calls one api method.
    fn bind<R, F>(&self, registry: &mut Registry, name: &str, signature: Signature, call: F)
    where
        R: Serialize + Send + 'static,
        F: Fn(&dyn QuorumApi, &Args) -> Result<ApiFuture<R>, AdaptError> + Send + Sync + 'static,
    {
        let api = Arc::clone(&self.api);
        registry.func_async(name, signature, move |args| {
            let future = call(api.as_ref(), &args);
            async move { Ok::<R, BridgeError>(future?.await?) }
        });
    }

    fn register_lifecycle(&self, registry: &mut Registry) {
        let api = Arc::clone(&self.api);
        let lifecycle = Arc::clone(&self.lifecycle);
        registry.func_async(
            "StartQuorum",
            Signature::new().string().string_list(),
            move |args| {
                // The transition to Starting happens on the caller's thread,
                // so IsQuorumRunning sees it as soon as the call returns.
                let started = args
                    .string(0)
                    .and_then(|password| Ok((password, args.list(1)?)))
                    .map_err(BridgeError::from)
                    .and_then(|params| Ok((lifecycle.begin_start()?, params)));
                let api = Arc::clone(&api);
                let lifecycle = Arc::clone(&lifecycle);
                async move {
                    let (ticket, (password, boot_addrs)) = started?;
                    match api.start_quorum(ticket.signal(), password, boot_addrs).await {
                        Ok(true) => Ok(StartResult {
                            ok: lifecycle.mark_running(&ticket),
                        }),
                        Ok(false) => {
                            lifecycle.abort_start(&ticket);
                            Ok(StartResult { ok: false })
                        }
                        Err(err) => {
                            lifecycle.abort_start(&ticket);
                            Err(BridgeError::from(err))
                        }
                    }
                }
            },
        );

        let lifecycle = Arc::clone(&self.lifecycle);
        registry.func_sync("IsQuorumRunning", Signature::new(), move |_| {
            Ok(HostValue::Bool(lifecycle.is_active()))
        });

        let lifecycle = Arc::clone(&self.lifecycle);
        registry.func_sync("StopQuorum", Signature::new(), move |_| {
            Ok(HostValue::Bool(lifecycle.stop()))
        });
    }

    fn register_diagnostics(&self, registry: &mut Registry) {
        let logs = self.logs.clone();
        registry.func_sync("SetDebug", Signature::new().boolean(), move |args| {
            logs.set_debug(args.boolean(0)?);
            Ok(HostValue::Bool(true))
        });

        let api = Arc::clone(&self.api);
        let spawner = self.spawner.clone();
        registry.func_sync("StorageSelfTest", Signature::new(), move |_| {
            let probe = api.storage_self_test();
            spawner.spawn_detached("StorageSelfTest", async move {
                let report = probe.await?;
                if report.ok {
                    tracing::info!(entries = report.entries, elapsed_ms = report.elapsed_ms, "storage self test passed");
                } else {
                    tracing::warn!(entries = report.entries, "storage self test failed");
                }
                Ok(())
            });
            Ok(HostValue::Bool(true))
        });
    }
}

/// Assemble a runtime serving `api` on `handle`.
///
/// Deferreds are the only way results reach the caller; nothing is
/// published to a host loop. Returns the runtime and the lifecycle shared by
/// the start and stop operations.
pub fn build_runtime(
    api: Arc<dyn QuorumApi>,
    logs: LogControl,
    handle: Handle,
    arity_policy: ArityPolicy,
) -> (Runtime, Arc<Lifecycle>) {
    assemble(api, logs, AsyncBridge::new(handle), arity_policy)
}

/// Like [`build_runtime`], but every settlement is also published to the
/// returned [`HostLoop`] in completion order.
///
/// Settlements queue until the loop reads them, so the caller must keep
/// draining it for as long as the runtime is in use.
pub fn build_runtime_with_host_loop(
    api: Arc<dyn QuorumApi>,
    logs: LogControl,
    handle: Handle,
    arity_policy: ArityPolicy,
) -> (Runtime, HostLoop, Arc<Lifecycle>) {
    let (bridge, host_loop) = AsyncBridge::with_settlements(handle);
    let (runtime, lifecycle) = assemble(api, logs, bridge, arity_policy);
    (runtime, host_loop, lifecycle)
}

fn assemble(
    api: Arc<dyn QuorumApi>,
    logs: LogControl,
    bridge: AsyncBridge,
    arity_policy: ArityPolicy,
) -> (Runtime, Arc<Lifecycle>) {
    let lifecycle = Arc::new(Lifecycle::new());
    let bindings = QuorumBindings::new(api, Arc::clone(&lifecycle), logs, bridge.clone());

    let mut registry = Registry::new();
    registry.register_provider(&bindings);
    let runtime = Runtime::new(registry, bridge).with_arity_policy(arity_policy);
    (runtime, lifecycle)
}

impl OperationProvider for QuorumBindings {
    fn register(&self, registry: &mut Registry) {
        self.register_lifecycle(registry);
        self.register_diagnostics(registry);

        let id = || Signature::new().string();
        let json = || Signature::new().string();
        let pair = || Signature::new().string().string();
        let none = Signature::new;

        self.bind(registry, "StartSync", id(), |api, args| Ok(api.start_sync(args.string(0)?)));
        self.bind(registry, "Announce", json(), |api, args| Ok(api.announce(args.string(0)?)));
        self.bind(registry, "GetGroupProducers", id(), |api, args| {
            Ok(api.get_group_producers(args.string(0)?))
        });
        self.bind(registry, "GetAnnouncedGroupProducers", id(), |api, args| {
            Ok(api.get_announced_group_producers(args.string(0)?))
        });
        self.bind(registry, "GetAnnouncedGroupUsers", id(), |api, args| {
            Ok(api.get_announced_group_users(args.string(0)?))
        });
        self.bind(registry, "GroupProducer", json(), |api, args| {
            Ok(api.group_producer(args.string(0)?))
        });
        self.bind(registry, "AddPeers", Signature::new().string_list(), |api, args| {
            Ok(api.add_peers(args.list(0)?))
        });
        self.bind(registry, "CreateGroup", json(), |api, args| Ok(api.create_group(args.string(0)?)));
        self.bind(registry, "MgrGrpBlkList", json(), |api, args| {
            Ok(api.mgr_grp_blk_list(args.string(0)?))
        });
        self.bind(registry, "GetDeniedUserList", id(), |api, args| {
            Ok(api.get_denied_user_list(args.string(0)?))
        });
        self.bind(registry, "Ping", id(), |api, args| Ok(api.ping(args.string(0)?)));
        self.bind(registry, "UpdateProfile", json(), |api, args| {
            Ok(api.update_profile(args.string(0)?))
        });
        self.bind(registry, "GetTrx", pair(), |api, args| {
            Ok(api.get_trx(args.string(0)?, args.string(1)?))
        });
        self.bind(registry, "PostToGroup", json(), |api, args| Ok(api.post_to_group(args.string(0)?)));
        self.bind(registry, "GetNodeInfo", none(), |api, _| Ok(api.get_node_info()));
        self.bind(registry, "GetNetwork", none(), |api, _| Ok(api.get_network()));
        self.bind(
            registry,
            "GetContent",
            Signature::new()
                .string()
                .integer()
                .string()
                .boolean()
                .rest(crate::abi::ParamKind::String),
            |api, args| {
                Ok(api.get_content(ContentQuery {
                    group_id: args.string(0)?,
                    num: args.integer(1)?,
                    start_trx: args.string(2)?,
                    reverse: args.boolean(3)?,
                    senders: args.rest_strings()?,
                }))
            },
        );
        self.bind(registry, "JoinGroup", json(), |api, args| Ok(api.join_group(args.string(0)?)));
        self.bind(registry, "LeaveGroup", id(), |api, args| Ok(api.leave_group(args.string(0)?)));
        self.bind(registry, "ClearGroupData", id(), |api, args| {
            Ok(api.clear_group_data(args.string(0)?))
        });
        self.bind(registry, "GetGroups", none(), |api, _| Ok(api.get_groups()));
        self.bind(registry, "GetBlockById", pair(), |api, args| {
            Ok(api.get_block_by_id(args.string(0)?, args.string(1)?))
        });
        self.bind(registry, "GetDecodedBlockById", pair(), |api, args| {
            Ok(api.get_decoded_block_by_id(args.string(0)?, args.string(1)?))
        });
    }
}
