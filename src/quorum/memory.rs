//! In-memory node
//!
//! A [`QuorumApi`] that keeps groups, blocks and peers in process memory. It
//! gives the bindings a real backend to run against (the CLI and the tests)
//! without a network. Ids, keys and signatures are SHA-256 digests: stable
//! for a given peer name and easy to check, but not cryptographic
//! signatures.
//!
//! Every group change is one transaction in one new block, appended to the
//! group's chain.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::api::{ApiFuture, NativeError, QuorumApi};
use super::types::*;
use crate::config::NodeConfig;
use crate::runtime::ShutdownSignal;

const NODE_VERSION: &str = concat!("quorum-bridge/", env!("CARGO_PKG_VERSION"));
const PROTOCOL: &str = "/quorum/1.0.0";
const TRX_VERSION: &str = "1.0.0";
const CONTENT_TYPE_URL: &str = "quorum.pb.Object";
const PING_PROBES: usize = 10;
const STORAGE_PROBE_ENTRIES: usize = 256;

// ============================================================================
// Digests
// ============================================================================

/// Length-prefixed SHA-256 over a sequence of fields.
struct IdHasher {
    hasher: Sha256,
}

impl IdHasher {
    fn new(tag: &str) -> Self {
        Self {
            hasher: Sha256::new(),
        }
        .field(tag)
    }

    fn field(mut self, s: &str) -> Self {
        self.hasher.update((s.len() as u32).to_le_bytes());
        self.hasher.update(s.as_bytes());
        self
    }

    fn finish(self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.hasher.finalize());
        bytes
    }

    fn hex(self) -> String {
        to_hex(&self.finish())
    }

    /// First 16 bytes, formatted as a UUID.
    fn uuid(self) -> String {
        let hex = to_hex(&self.finish()[..16]);
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

/// Digest that makes a seed tamper-evident. Anyone holding the seed can
/// recompute it.
fn seed_digest(seed: &GroupSeed) -> String {
    IdHasher::new("seed")
        .field(&seed.group_id)
        .field(&seed.group_name)
        .field(&seed.owner_pubkey)
        .field(&seed.genesis_block.block_id)
        .field(&seed.consensus_type)
        .field(&seed.encryption_type)
        .field(&seed.cipher_key)
        .field(&seed.app_key)
        .hex()
}

/// The peer id inside a multiaddr (`/ip4/.../p2p/<id>`), or the address
/// itself when it has none.
fn peer_id_of(addr: &str) -> &str {
    addr.rsplit_once("/p2p/").map(|(_, id)| id).unwrap_or(addr)
}

struct Identity {
    peer_id: String,
    pubkey: String,
    encrypt_pubkey: String,
    secret: String,
}

impl Identity {
    fn derive(peer_name: &str) -> Self {
        let digest = IdHasher::new("peer").field(peer_name).hex();
        Self {
            peer_id: format!("16Uiu2HAm{}", &digest[..40]),
            pubkey: IdHasher::new("sign-key").field(peer_name).hex(),
            encrypt_pubkey: IdHasher::new("encrypt-key").field(peer_name).hex(),
            secret: IdHasher::new("secret").field(peer_name).hex(),
        }
    }

    fn sign(&self, fields: &[&str]) -> String {
        fields
            .iter()
            .fold(IdHasher::new("sign").field(&self.secret), |h, f| h.field(f))
            .hex()
    }
}

// ============================================================================
// State
// ============================================================================

struct Group {
    seed: GroupSeed,
    user_pubkey: String,
    blocks: Vec<Block>,
    producers: Vec<ProducerItem>,
    announced_producers: Vec<AnnouncedProducer>,
    announced_users: Vec<AnnouncedUser>,
    denied: Vec<DeniedUser>,
    syncing: bool,
    last_updated: i64,
}

impl Group {
    fn from_seed(seed: GroupSeed, user_pubkey: String) -> Self {
        let owner = ProducerItem {
            producer_pubkey: seed.owner_pubkey.clone(),
            owner_pubkey: seed.owner_pubkey.clone(),
            owner_sign: seed.signature.clone(),
            timestamp: seed.genesis_block.timestamp,
            block_produced: 1,
        };
        Self {
            blocks: vec![seed.genesis_block.clone()],
            last_updated: seed.genesis_block.timestamp,
            seed,
            user_pubkey,
            producers: vec![owner],
            announced_producers: Vec::new(),
            announced_users: Vec::new(),
            denied: Vec::new(),
            syncing: false,
        }
    }

    fn trxs(&self) -> impl Iterator<Item = &Trx> {
        self.blocks.iter().flat_map(|block| block.trxs.iter())
    }

    fn info(&self) -> GroupInfo {
        let head = self.blocks.last();
        GroupInfo {
            group_id: self.seed.group_id.clone(),
            group_name: self.seed.group_name.clone(),
            owner_pubkey: self.seed.owner_pubkey.clone(),
            user_pubkey: self.user_pubkey.clone(),
            consensus_type: self.seed.consensus_type.clone(),
            encryption_type: self.seed.encryption_type.clone(),
            cipher_key: self.seed.cipher_key.clone(),
            app_key: self.seed.app_key.clone(),
            last_updated: self.last_updated,
            highest_height: self.blocks.len().saturating_sub(1) as u64,
            highest_block_id: head.map(|b| b.block_id.clone()).unwrap_or_default(),
            group_status: if self.syncing { "SYNCING" } else { "IDLE" }.to_string(),
        }
    }

    fn truncate_to_genesis(&mut self) {
        self.blocks.truncate(1);
        self.announced_producers.clear();
        self.announced_users.clear();
        self.denied.clear();
        self.producers.truncate(1);
        self.last_updated = now_nanos();
    }
}

#[derive(Default)]
struct NodeState {
    peers: BTreeSet<String>,
    groups: BTreeMap<String, Group>,
    /// Groups this node left, kept until their data is cleared.
    left: BTreeMap<String, Group>,
    store: BTreeMap<String, Vec<u8>>,
}

impl NodeState {
    fn group(&self, group_id: &str) -> Result<&Group, NativeError> {
        self.groups
            .get(group_id)
            .ok_or_else(|| NativeError::GroupNotFound(group_id.to_string()))
    }

    fn group_mut(&mut self, group_id: &str) -> Result<&mut Group, NativeError> {
        self.groups
            .get_mut(group_id)
            .ok_or_else(|| NativeError::GroupNotFound(group_id.to_string()))
    }
}

struct Inner {
    config: NodeConfig,
    identity: Identity,
    /// Id of the current session, `0` while offline.
    session: AtomicU64,
    sessions: AtomicU64,
    ids: AtomicU64,
    state: RwLock<NodeState>,
}

/// A single node held entirely in memory. Cheap to clone.
#[derive(Clone)]
pub struct MemoryNode {
    inner: Arc<Inner>,
}

impl MemoryNode {
    pub fn new(config: NodeConfig) -> Self {
        let identity = Identity::derive(&config.peer_name);
        Self {
            inner: Arc::new(Inner {
                config,
                identity,
                session: AtomicU64::new(0),
                sessions: AtomicU64::new(0),
                ids: AtomicU64::new(0),
                state: RwLock::new(NodeState::default()),
            }),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.inner.identity.peer_id
    }

    pub fn pubkey(&self) -> &str {
        &self.inner.identity.pubkey
    }

    pub fn is_online(&self) -> bool {
        self.inner.session.load(Ordering::SeqCst) != 0
    }

    fn run<T, F, Fut>(&self, f: F) -> ApiFuture<T>
    where
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = Result<T, NativeError>> + Send + 'static,
    {
        Box::pin(f(Arc::clone(&self.inner)))
    }
}

impl Inner {
    fn ensure_online(&self) -> Result<(), NativeError> {
        if self.session.load(Ordering::SeqCst) == 0 {
            return Err(NativeError::NotRunning);
        }
        Ok(())
    }

    fn new_id(&self, kind: &str) -> String {
        let n = self.ids.fetch_add(1, Ordering::Relaxed);
        IdHasher::new(kind)
            .field(&self.config.peer_name)
            .field(&n.to_string())
            .uuid()
    }

    fn require_owner(&self, group: &Group) -> Result<(), NativeError> {
        if group.seed.owner_pubkey != self.identity.pubkey {
            return Err(NativeError::PermissionDenied(format!(
                "only the owner of group {} can do this",
                group.seed.group_id
            )));
        }
        Ok(())
    }

    /// Wrap `data` in a trx, seal it in a new block and append the block.
    fn append<D: Serialize + ?Sized>(&self, group: &mut Group, kind: &str, data: &D) -> Result<Trx, NativeError> {
        let timestamp = now_nanos();
        let data = serde_json::to_string(data)?;
        let trx_id = self.new_id("trx");
        let trx = Trx {
            sender_sign: self.identity.sign(&[&trx_id, &data]),
            trx_id,
            kind: kind.to_string(),
            group_id: group.seed.group_id.clone(),
            sender_pubkey: self.identity.pubkey.clone(),
            data,
            timestamp,
            version: TRX_VERSION.to_string(),
        };

        let prev_block_id = group
            .blocks
            .last()
            .map(|b| b.block_id.clone())
            .unwrap_or_default();
        let block_id = self.new_id("block");
        group.blocks.push(Block {
            sign: self.identity.sign(&[&block_id, &prev_block_id, &trx.trx_id]),
            block_id,
            group_id: group.seed.group_id.clone(),
            prev_block_id,
            producer_pubkey: self.identity.pubkey.clone(),
            trxs: vec![trx.clone()],
            timestamp,
        });
        if let Some(owner) = group.producers.first_mut() {
            owner.block_produced += 1;
        }
        group.last_updated = timestamp;
        tracing::debug!(group_id = %trx.group_id, trx_id = %trx.trx_id, kind, "appended trx");
        Ok(trx)
    }

    async fn start(
        self: Arc<Self>,
        mut shutdown: ShutdownSignal,
        password: String,
        boot_addrs: Vec<String>,
    ) -> Result<bool, NativeError> {
        if password.is_empty() {
            return Err(NativeError::InvalidPayload("password is required".into()));
        }
        if shutdown.is_shutdown() {
            return Ok(false);
        }

        {
            let mut state = self.state.write().await;
            for addr in self.config.boot_addrs.iter().chain(&boot_addrs) {
                if !addr.is_empty() {
                    state.peers.insert(addr.clone());
                }
            }
        }

        let session = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.session.store(session, Ordering::SeqCst);
        tracing::info!(peer_id = %self.identity.peer_id, session, "node online");

        let node = Arc::clone(&self);
        tokio::spawn(async move {
            shutdown.wait().await;
            // A newer session may already be live.
            if node
                .session
                .compare_exchange(session, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                tracing::info!(peer_id = %node.identity.peer_id, session, "node offline");
            }
        });
        Ok(true)
    }

    async fn start_sync(&self, group_id: String) -> Result<StartSyncResult, NativeError> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let group = state.group_mut(&group_id)?;
        group.syncing = true;
        Ok(StartSyncResult {
            group_id,
            status: "SYNCING".to_string(),
        })
    }

    async fn announce(&self, params: String) -> Result<AnnounceResult, NativeError> {
        self.ensure_online()?;
        let params: AnnounceParams = serde_json::from_str(&params)?;
        if params.action != "add" && params.action != "remove" {
            return Err(NativeError::InvalidPayload(format!("unknown action: {}", params.action)));
        }

        let mut state = self.state.write().await;
        let group = state.group_mut(&params.group_id)?;
        let pubkey = self.identity.pubkey.clone();
        let sign = self.identity.sign(&[&params.group_id, &pubkey, &params.kind, &params.action]);
        let timestamp = now_nanos();
        let encrypt_pubkey = match params.kind.as_str() {
            "producer" => {
                group.announced_producers.retain(|p| p.announced_pubkey != pubkey);
                group.announced_producers.push(AnnouncedProducer {
                    announced_pubkey: pubkey.clone(),
                    announcer_sign: sign.clone(),
                    result: "ANNOUNCED".to_string(),
                    action: params.action.clone(),
                    timestamp,
                });
                None
            }
            "user" => {
                group.announced_users.retain(|u| u.announced_sign_pubkey != pubkey);
                group.announced_users.push(AnnouncedUser {
                    announced_sign_pubkey: pubkey.clone(),
                    announced_encrypt_pubkey: Some(self.identity.encrypt_pubkey.clone()),
                    announcer_sign: sign.clone(),
                    result: "ANNOUNCED".to_string(),
                    timestamp,
                });
                Some(self.identity.encrypt_pubkey.clone())
            }
            other => {
                return Err(NativeError::InvalidPayload(format!("unknown announce type: {}", other)))
            }
        };

        let trx = self.append(group, "ANNOUNCE", &params)?;
        Ok(AnnounceResult {
            group_id: params.group_id,
            sign_pubkey: pubkey,
            encrypt_pubkey,
            kind: params.kind,
            action: params.action,
            sign,
            trx_id: trx.trx_id,
        })
    }

    async fn group_producer(&self, params: String) -> Result<GroupProducerResult, NativeError> {
        self.ensure_online()?;
        let params: GroupProducerParams = serde_json::from_str(&params)?;
        let mut state = self.state.write().await;
        let group = state.group_mut(&params.group_id)?;
        self.require_owner(group)?;

        let owner_pubkey = group.seed.owner_pubkey.clone();
        let sign = self.identity.sign(&[&params.group_id, &params.producer_pubkey, &params.action]);
        let exists = group
            .producers
            .iter()
            .any(|p| p.producer_pubkey == params.producer_pubkey);
        match params.action.as_str() {
            "add" if exists => {
                return Err(NativeError::InvalidPayload(format!(
                    "{} is already a producer",
                    params.producer_pubkey
                )))
            }
            "add" => {
                group.producers.push(ProducerItem {
                    producer_pubkey: params.producer_pubkey.clone(),
                    owner_pubkey: owner_pubkey.clone(),
                    owner_sign: sign.clone(),
                    timestamp: now_nanos(),
                    block_produced: 0,
                });
                for announced in &mut group.announced_producers {
                    if announced.announced_pubkey == params.producer_pubkey {
                        announced.result = "APPROVED".to_string();
                    }
                }
            }
            "remove" if params.producer_pubkey == owner_pubkey => {
                return Err(NativeError::InvalidPayload("the owner cannot be removed".into()))
            }
            "remove" if !exists => {
                return Err(NativeError::InvalidPayload(format!(
                    "{} is not a producer",
                    params.producer_pubkey
                )))
            }
            "remove" => group
                .producers
                .retain(|p| p.producer_pubkey != params.producer_pubkey),
            other => return Err(NativeError::InvalidPayload(format!("unknown action: {}", other))),
        }

        let trx = self.append(group, "PRODUCER", &params)?;
        Ok(GroupProducerResult {
            group_id: params.group_id,
            producer_pubkey: params.producer_pubkey,
            owner_pubkey,
            sign,
            trx_id: trx.trx_id,
            memo: params.memo,
            action: params.action,
        })
    }

    async fn add_peers(&self, peers: Vec<String>) -> Result<AddPeersResult, NativeError> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let mut result = AddPeersResult::default();
        for addr in peers {
            let reason = if addr.is_empty() {
                Some("empty address")
            } else if !addr.starts_with('/') {
                Some("not a multiaddr")
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    result.err_count += 1;
                    result.errs.push(PeerError {
                        addr,
                        reason: reason.to_string(),
                    });
                }
                None => {
                    state.peers.insert(addr);
                    result.succ_count += 1;
                }
            }
        }
        Ok(result)
    }

    async fn create_group(&self, params: String) -> Result<GroupSeed, NativeError> {
        self.ensure_online()?;
        let params: CreateGroupParams = serde_json::from_str(&params)?;
        if params.group_name.trim().is_empty() {
            return Err(NativeError::InvalidPayload("group_name is required".into()));
        }
        if params.encryption_type != "public" && params.encryption_type != "private" {
            return Err(NativeError::InvalidPayload(format!(
                "unknown encryption_type: {}",
                params.encryption_type
            )));
        }

        let group_id = self.new_id("group");
        let block_id = self.new_id("block");
        let timestamp = now_nanos();
        let genesis_block = Block {
            sign: self.identity.sign(&[&block_id, &group_id]),
            block_id,
            group_id: group_id.clone(),
            prev_block_id: String::new(),
            producer_pubkey: self.identity.pubkey.clone(),
            trxs: Vec::new(),
            timestamp,
        };
        let mut seed = GroupSeed {
            genesis_block,
            cipher_key: IdHasher::new("cipher").field(&self.identity.secret).field(&group_id).hex(),
            group_id: group_id.clone(),
            group_name: params.group_name,
            owner_pubkey: self.identity.pubkey.clone(),
            consensus_type: params.consensus_type,
            encryption_type: params.encryption_type,
            app_key: params.app_key,
            signature: String::new(),
        };
        seed.signature = seed_digest(&seed);

        let group = Group::from_seed(seed.clone(), self.identity.pubkey.clone());
        self.state.write().await.groups.insert(group_id.clone(), group);
        tracing::debug!(group_id = %group_id, "created group");
        Ok(seed)
    }

    async fn mgr_grp_blk_list(&self, params: String) -> Result<DenyUserResult, NativeError> {
        self.ensure_online()?;
        let params: DenyUserParams = serde_json::from_str(&params)?;
        let mut state = self.state.write().await;
        let group = state.group_mut(&params.group_id)?;
        self.require_owner(group)?;

        let owner_pubkey = group.seed.owner_pubkey.clone();
        let sign = self.identity.sign(&[&params.group_id, &params.peer_id, &params.action]);
        group.denied.retain(|d| d.peer_id != params.peer_id);
        match params.action.as_str() {
            "add" => group.denied.push(DeniedUser {
                group_id: params.group_id.clone(),
                peer_id: params.peer_id.clone(),
                group_owner_pubkey: owner_pubkey.clone(),
                group_owner_sign: sign.clone(),
                timestamp: now_nanos(),
                action: params.action.clone(),
                memo: params.memo.clone(),
            }),
            "del" => {}
            other => return Err(NativeError::InvalidPayload(format!("unknown action: {}", other))),
        }

        let trx = self.append(group, "AUTH", &params)?;
        Ok(DenyUserResult {
            group_id: params.group_id,
            peer_id: params.peer_id,
            owner_pubkey,
            sign,
            trx_id: trx.trx_id,
            action: params.action,
            memo: params.memo,
        })
    }

    async fn ping(&self, peer: String) -> Result<PingResult, NativeError> {
        self.ensure_online()?;
        let known = self
            .state
            .read()
            .await
            .peers
            .iter()
            .any(|addr| addr == &peer || peer_id_of(addr) == peer);
        if !known {
            return Err(NativeError::PeerNotFound(peer));
        }

        let latency = Duration::from_millis(self.config.ping_latency_ms);
        let mut ttl_ms = Vec::with_capacity(PING_PROBES);
        for _ in 0..PING_PROBES {
            let start = Instant::now();
            tokio::time::sleep(latency).await;
            ttl_ms.push(start.elapsed().as_millis() as u64);
        }
        Ok(PingResult { peer, ttl_ms })
    }

    async fn update_profile(&self, params: String) -> Result<TrxResult, NativeError> {
        self.ensure_online()?;
        let params: UpdateProfileParams = serde_json::from_str(&params)?;
        if params.name.trim().is_empty() {
            return Err(NativeError::InvalidPayload("name is required".into()));
        }
        let mut state = self.state.write().await;
        let group = state.group_mut(&params.group_id)?;
        let trx = self.append(group, "PROFILE", &params)?;
        Ok(TrxResult { trx_id: trx.trx_id })
    }

    async fn get_trx(&self, group_id: String, trx_id: String) -> Result<Trx, NativeError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let found = state
            .group(&group_id)?
            .trxs()
            .find(|trx| trx.trx_id == trx_id)
            .cloned();
        found.ok_or(NativeError::TrxNotFound(trx_id))
    }

    async fn post_to_group(&self, params: String) -> Result<TrxResult, NativeError> {
        self.ensure_online()?;
        let params: PostParams = serde_json::from_str(&params)?;
        if params.target.kind != "Group" {
            return Err(NativeError::InvalidPayload(format!(
                "unknown target type: {}",
                params.target.kind
            )));
        }
        if params.object.content.is_empty() {
            return Err(NativeError::InvalidPayload("object.content is required".into()));
        }

        let mut state = self.state.write().await;
        let group = state.group_mut(&params.target.id)?;
        if group.denied.iter().any(|d| d.peer_id == self.identity.peer_id) {
            return Err(NativeError::PermissionDenied(format!(
                "{} is denied in group {}",
                self.identity.peer_id, params.target.id
            )));
        }
        let trx = self.append(group, "POST", &params.object)?;
        Ok(TrxResult { trx_id: trx.trx_id })
    }

    async fn node_info(&self) -> Result<NodeInfo, NativeError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut peers = BTreeMap::new();
        peers.insert(
            PROTOCOL.to_string(),
            state.peers.iter().map(|addr| peer_id_of(addr).to_string()).collect(),
        );
        Ok(NodeInfo {
            node_id: self.identity.peer_id.clone(),
            node_publickey: self.identity.pubkey.clone(),
            node_status: "NODE_ONLINE".to_string(),
            node_type: "peer".to_string(),
            node_version: NODE_VERSION.to_string(),
            peers,
        })
    }

    async fn network(&self) -> Result<NetworkInfo, NativeError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let peers: Vec<String> = state
            .peers
            .iter()
            .map(|addr| peer_id_of(addr).to_string())
            .collect();
        Ok(NetworkInfo {
            peer_id: self.identity.peer_id.clone(),
            addrs: vec![format!("/memory/{}", self.identity.peer_id)],
            groups: state
                .groups
                .values()
                .map(|group| NetworkGroup {
                    group_id: group.seed.group_id.clone(),
                    group_name: group.seed.group_name.clone(),
                    peers: peers.clone(),
                })
                .collect(),
            nat_type: "Unknown".to_string(),
        })
    }

    async fn get_content(&self, query: ContentQuery) -> Result<ContentList, NativeError> {
        self.ensure_online()?;
        if query.num <= 0 {
            return Err(NativeError::InvalidPayload(format!("num must be positive, got {}", query.num)));
        }

        let state = self.state.read().await;
        let mut posts: Vec<&Trx> = state
            .group(&query.group_id)?
            .trxs()
            .filter(|trx| trx.kind == "POST")
            .filter(|trx| query.senders.is_empty() || query.senders.contains(&trx.sender_pubkey))
            .collect();
        if query.reverse {
            posts.reverse();
        }

        let skip = if query.start_trx.is_empty() {
            0
        } else {
            posts
                .iter()
                .position(|trx| trx.trx_id == query.start_trx)
                .map(|at| at + 1)
                .ok_or_else(|| NativeError::TrxNotFound(query.start_trx.clone()))?
        };

        let contents = posts
            .into_iter()
            .skip(skip)
            .take(query.num as usize)
            .map(|trx| ContentItem {
                trx_id: trx.trx_id.clone(),
                publisher: trx.sender_pubkey.clone(),
                content: serde_json::from_str(&trx.data)
                    .unwrap_or_else(|_| serde_json::Value::String(trx.data.clone())),
                type_url: CONTENT_TYPE_URL.to_string(),
                timestamp: trx.timestamp,
            })
            .collect();
        Ok(ContentList { contents })
    }

    async fn join_group(&self, seed: String) -> Result<JoinGroupResult, NativeError> {
        self.ensure_online()?;
        let seed: GroupSeed = serde_json::from_str(&seed)?;
        if seed_digest(&seed) != seed.signature {
            return Err(NativeError::InvalidPayload("seed signature mismatch".into()));
        }

        let mut state = self.state.write().await;
        if state.groups.contains_key(&seed.group_id) {
            return Err(NativeError::InvalidPayload(format!(
                "group already joined: {}",
                seed.group_id
            )));
        }
        state.left.remove(&seed.group_id);

        let user_pubkey = self.identity.pubkey.clone();
        let result = JoinGroupResult {
            group_id: seed.group_id.clone(),
            group_name: seed.group_name.clone(),
            owner_pubkey: seed.owner_pubkey.clone(),
            user_pubkey: user_pubkey.clone(),
            consensus_type: seed.consensus_type.clone(),
            encryption_type: seed.encryption_type.clone(),
            cipher_key: seed.cipher_key.clone(),
            app_key: seed.app_key.clone(),
            signature: self.identity.sign(&[&seed.group_id, &user_pubkey]),
        };
        state
            .groups
            .insert(seed.group_id.clone(), Group::from_seed(seed, user_pubkey));
        tracing::debug!(group_id = %result.group_id, "joined group");
        Ok(result)
    }

    async fn leave_group(&self, group_id: String) -> Result<LeaveGroupResult, NativeError> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let group = state
            .groups
            .remove(&group_id)
            .ok_or_else(|| NativeError::GroupNotFound(group_id.clone()))?;
        state.left.insert(group_id.clone(), group);
        Ok(LeaveGroupResult {
            signature: self.identity.sign(&[&group_id, "leave"]),
            group_id,
        })
    }

    async fn clear_group_data(&self, group_id: String) -> Result<ClearGroupDataResult, NativeError> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        if state.left.remove(&group_id).is_none() {
            state.group_mut(&group_id)?.truncate_to_genesis();
        }
        Ok(ClearGroupDataResult {
            signature: self.identity.sign(&[&group_id, "clear"]),
            group_id,
        })
    }

    async fn groups(&self) -> Result<GroupList, NativeError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(GroupList {
            groups: state.groups.values().map(Group::info).collect(),
        })
    }

    async fn block(&self, group_id: &str, block_id: &str) -> Result<Block, NativeError> {
        self.ensure_online()?;
        let state = self.state.read().await;
        state
            .group(group_id)?
            .blocks
            .iter()
            .find(|block| block.block_id == block_id)
            .cloned()
            .ok_or_else(|| NativeError::BlockNotFound(block_id.to_string()))
    }

    async fn storage_self_test(&self) -> Result<StorageReport, NativeError> {
        let start = Instant::now();
        let mut state = self.state.write().await;
        let entries: Vec<(String, Vec<u8>)> = (0..STORAGE_PROBE_ENTRIES)
            .map(|i| {
                let key = format!("probe/{}", i);
                let value = IdHasher::new("probe").field(&key).finish().to_vec();
                (key, value)
            })
            .collect();

        for (key, value) in &entries {
            state.store.insert(key.clone(), value.clone());
        }
        let ok = entries
            .iter()
            .all(|(key, value)| state.store.get(key) == Some(value));
        for (key, _) in &entries {
            state.store.remove(key);
        }

        Ok(StorageReport {
            ok,
            entries: entries.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn decode_block(block: Block) -> DecodedBlock {
    DecodedBlock {
        block_id: block.block_id,
        group_id: block.group_id,
        prev_block_id: block.prev_block_id,
        producer_pubkey: block.producer_pubkey,
        trxs: block
            .trxs
            .into_iter()
            .map(|trx| DecodedTrx {
                data: serde_json::from_str(&trx.data).unwrap_or(serde_json::Value::String(trx.data)),
                trx_id: trx.trx_id,
                kind: trx.kind,
                sender_pubkey: trx.sender_pubkey,
                timestamp: trx.timestamp,
            })
            .collect(),
        sign: block.sign,
        timestamp: block.timestamp,
    }
}

impl QuorumApi for MemoryNode {
    fn start_quorum(
        &self,
        shutdown: ShutdownSignal,
        password: String,
        boot_addrs: Vec<String>,
    ) -> ApiFuture<bool> {
        self.run(|node| node.start(shutdown, password, boot_addrs))
    }

    fn start_sync(&self, group_id: String) -> ApiFuture<StartSyncResult> {
        self.run(|node| async move { node.start_sync(group_id).await })
    }

    fn announce(&self, params: String) -> ApiFuture<AnnounceResult> {
        self.run(|node| async move { node.announce(params).await })
    }

    fn get_group_producers(&self, group_id: String) -> ApiFuture<ProducerList> {
        self.run(|node| async move {
            node.ensure_online()?;
            let state = node.state.read().await;
            Ok(ProducerList {
                producers: state.group(&group_id)?.producers.clone(),
            })
        })
    }

    fn get_announced_group_producers(&self, group_id: String) -> ApiFuture<AnnouncedProducerList> {
        self.run(|node| async move {
            node.ensure_online()?;
            let state = node.state.read().await;
            Ok(AnnouncedProducerList {
                producers: state.group(&group_id)?.announced_producers.clone(),
            })
        })
    }

    fn get_announced_group_users(&self, group_id: String) -> ApiFuture<AnnouncedUserList> {
        self.run(|node| async move {
            node.ensure_online()?;
            let state = node.state.read().await;
            Ok(AnnouncedUserList {
                users: state.group(&group_id)?.announced_users.clone(),
            })
        })
    }

    fn group_producer(&self, params: String) -> ApiFuture<GroupProducerResult> {
        self.run(|node| async move { node.group_producer(params).await })
    }

    fn add_peers(&self, peers: Vec<String>) -> ApiFuture<AddPeersResult> {
        self.run(|node| async move { node.add_peers(peers).await })
    }

    fn create_group(&self, params: String) -> ApiFuture<GroupSeed> {
        self.run(|node| async move { node.create_group(params).await })
    }

    fn mgr_grp_blk_list(&self, params: String) -> ApiFuture<DenyUserResult> {
        self.run(|node| async move { node.mgr_grp_blk_list(params).await })
    }

    fn get_denied_user_list(&self, group_id: String) -> ApiFuture<DeniedUserList> {
        self.run(|node| async move {
            node.ensure_online()?;
            let state = node.state.read().await;
            Ok(DeniedUserList {
                users: state.group(&group_id)?.denied.clone(),
            })
        })
    }

    fn ping(&self, peer: String) -> ApiFuture<PingResult> {
        self.run(|node| async move { node.ping(peer).await })
    }

    fn update_profile(&self, params: String) -> ApiFuture<TrxResult> {
        self.run(|node| async move { node.update_profile(params).await })
    }

    fn get_trx(&self, group_id: String, trx_id: String) -> ApiFuture<Trx> {
        self.run(|node| async move { node.get_trx(group_id, trx_id).await })
    }

    fn post_to_group(&self, params: String) -> ApiFuture<TrxResult> {
        self.run(|node| async move { node.post_to_group(params).await })
    }

    fn get_node_info(&self) -> ApiFuture<NodeInfo> {
        self.run(|node| async move { node.node_info().await })
    }

    fn get_network(&self) -> ApiFuture<NetworkInfo> {
        self.run(|node| async move { node.network().await })
    }

    fn get_content(&self, query: ContentQuery) -> ApiFuture<ContentList> {
        self.run(|node| async move { node.get_content(query).await })
    }

    fn join_group(&self, seed: String) -> ApiFuture<JoinGroupResult> {
        self.run(|node| async move { node.join_group(seed).await })
    }

    fn leave_group(&self, group_id: String) -> ApiFuture<LeaveGroupResult> {
        self.run(|node| async move { node.leave_group(group_id).await })
    }

    fn clear_group_data(&self, group_id: String) -> ApiFuture<ClearGroupDataResult> {
        self.run(|node| async move { node.clear_group_data(group_id).await })
    }

    fn get_groups(&self) -> ApiFuture<GroupList> {
        self.run(|node| async move { node.groups().await })
    }

    fn get_block_by_id(&self, group_id: String, block_id: String) -> ApiFuture<Block> {
        self.run(|node| async move { node.block(&group_id, &block_id).await })
    }

    fn get_decoded_block_by_id(&self, group_id: String, block_id: String) -> ApiFuture<DecodedBlock> {
        self.run(|node| async move { node.block(&group_id, &block_id).await.map(decode_block) })
    }

    fn storage_self_test(&self) -> ApiFuture<StorageReport> {
        self.run(|node| async move { node.storage_self_test().await })
    }
}
