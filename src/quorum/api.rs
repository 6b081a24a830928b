//! The native node contract
//!
//! [`QuorumApi`] is everything the bindings need from a node. Methods take
//! owned arguments and return `'static` futures, so the bridge can move them
//! onto a worker task as they are.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use super::types::*;
use crate::runtime::ShutdownSignal;

/// Errors reported by a node. The bridge passes them to the host verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeError {
    #[error("quorum is not running")]
    NotRunning,

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("trx not found: {0}")]
    TrxNotFound(String),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for NativeError {
    fn from(err: serde_json::Error) -> Self {
        NativeError::InvalidPayload(err.to_string())
    }
}

/// Future returned by every node operation.
pub type ApiFuture<T> = Pin<Box<dyn Future<Output = Result<T, NativeError>> + Send + 'static>>;

fn unsupported<T: Send + 'static>(operation: &'static str) -> ApiFuture<T> {
    Box::pin(async move { Err(NativeError::Unsupported(operation)) })
}

/// One method per bound operation. Every method has a default that fails
/// with [`NativeError::Unsupported`], so partial nodes only implement what
/// they serve.
///
/// JSON arguments arrive as the host passed them; parsing them is the
/// node's job.
#[allow(unused_variables)]
pub trait QuorumApi: Send + Sync + 'static {
    /// Bring the node up. The node must stop when `shutdown` fires.
    fn start_quorum(
        &self,
        shutdown: ShutdownSignal,
        password: String,
        boot_addrs: Vec<String>,
    ) -> ApiFuture<bool> {
        unsupported("start_quorum")
    }

    fn start_sync(&self, group_id: String) -> ApiFuture<StartSyncResult> {
        unsupported("start_sync")
    }

    fn announce(&self, params: String) -> ApiFuture<AnnounceResult> {
        unsupported("announce")
    }

    fn get_group_producers(&self, group_id: String) -> ApiFuture<ProducerList> {
        unsupported("get_group_producers")
    }

    fn get_announced_group_producers(&self, group_id: String) -> ApiFuture<AnnouncedProducerList> {
        unsupported("get_announced_group_producers")
    }

    fn get_announced_group_users(&self, group_id: String) -> ApiFuture<AnnouncedUserList> {
        unsupported("get_announced_group_users")
    }

    fn group_producer(&self, params: String) -> ApiFuture<GroupProducerResult> {
        unsupported("group_producer")
    }

    fn add_peers(&self, peers: Vec<String>) -> ApiFuture<AddPeersResult> {
        unsupported("add_peers")
    }

    fn create_group(&self, params: String) -> ApiFuture<GroupSeed> {
        unsupported("create_group")
    }

    fn mgr_grp_blk_list(&self, params: String) -> ApiFuture<DenyUserResult> {
        unsupported("mgr_grp_blk_list")
    }

    fn get_denied_user_list(&self, group_id: String) -> ApiFuture<DeniedUserList> {
        unsupported("get_denied_user_list")
    }

    fn ping(&self, peer: String) -> ApiFuture<PingResult> {
        unsupported("ping")
    }

    fn update_profile(&self, params: String) -> ApiFuture<TrxResult> {
        unsupported("update_profile")
    }

    fn get_trx(&self, group_id: String, trx_id: String) -> ApiFuture<Trx> {
        unsupported("get_trx")
    }

    fn post_to_group(&self, params: String) -> ApiFuture<TrxResult> {
        unsupported("post_to_group")
    }

    fn get_node_info(&self) -> ApiFuture<NodeInfo> {
        unsupported("get_node_info")
    }

    fn get_network(&self) -> ApiFuture<NetworkInfo> {
        unsupported("get_network")
    }

    fn get_content(&self, query: ContentQuery) -> ApiFuture<ContentList> {
        unsupported("get_content")
    }

    fn join_group(&self, seed: String) -> ApiFuture<JoinGroupResult> {
        unsupported("join_group")
    }

    fn leave_group(&self, group_id: String) -> ApiFuture<LeaveGroupResult> {
        unsupported("leave_group")
    }

    fn clear_group_data(&self, group_id: String) -> ApiFuture<ClearGroupDataResult> {
        unsupported("clear_group_data")
    }

    fn get_groups(&self) -> ApiFuture<GroupList> {
        unsupported("get_groups")
    }

    fn get_block_by_id(&self, group_id: String, block_id: String) -> ApiFuture<Block> {
        unsupported("get_block_by_id")
    }

    fn get_decoded_block_by_id(&self, group_id: String, block_id: String) -> ApiFuture<DecodedBlock> {
        unsupported("get_decoded_block_by_id")
    }

    /// Write and read back a batch of scratch entries in the node's store.
    fn storage_self_test(&self) -> ApiFuture<StorageReport> {
        unsupported("storage_self_test")
    }
}
