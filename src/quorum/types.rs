//! Native request and result types
//!
//! Results are what the bridge marshals, so their serde field names are the
//! keys the host sees. Every result is a struct: a bare list or scalar would
//! not marshal to an object. Params are the JSON documents some operations
//! receive as a string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Nanosecond timestamps exceed the host's exact integer range, so they
/// travel as decimal strings. Reading also accepts a plain integer.
mod int64_string {
    use std::fmt;

    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    struct Int64Visitor;

    impl<'de> Visitor<'de> for Int64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an i64 as a decimal string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(Int64Visitor)
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResult {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSyncResult {
    pub group_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceResult {
    pub group_id: String,
    pub sign_pubkey: String,
    pub encrypt_pubkey: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub sign: String,
    pub trx_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerItem {
    pub producer_pubkey: String,
    pub owner_pubkey: String,
    pub owner_sign: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
    pub block_produced: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerList {
    pub producers: Vec<ProducerItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedProducer {
    pub announced_pubkey: String,
    pub announcer_sign: String,
    /// `ANNOUNCED` or `APPROVED`.
    pub result: String,
    pub action: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedProducerList {
    pub producers: Vec<AnnouncedProducer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedUser {
    pub announced_sign_pubkey: String,
    pub announced_encrypt_pubkey: Option<String>,
    pub announcer_sign: String,
    pub result: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedUserList {
    pub users: Vec<AnnouncedUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProducerResult {
    pub group_id: String,
    pub producer_pubkey: String,
    pub owner_pubkey: String,
    pub sign: String,
    pub trx_id: String,
    pub memo: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddPeersResult {
    pub succ_count: u32,
    pub err_count: u32,
    /// One entry per rejected address, in input order. Repeated addresses
    /// each get their own entry, so `errs.len() == err_count`.
    pub errs: Vec<PeerError>,
}

/// An address `AddPeers` did not add, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerError {
    pub addr: String,
    pub reason: String,
}

/// Everything needed to join a group. Produced by group creation, consumed by
/// `JoinGroup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSeed {
    pub genesis_block: Block,
    pub group_id: String,
    pub group_name: String,
    pub owner_pubkey: String,
    pub consensus_type: String,
    pub encryption_type: String,
    pub cipher_key: String,
    pub app_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenyUserResult {
    pub group_id: String,
    pub peer_id: String,
    pub owner_pubkey: String,
    pub sign: String,
    pub trx_id: String,
    pub action: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeniedUser {
    pub group_id: String,
    pub peer_id: String,
    pub group_owner_pubkey: String,
    pub group_owner_sign: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
    pub action: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeniedUserList {
    pub users: Vec<DeniedUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub peer: String,
    /// Round trip of each probe, in milliseconds.
    pub ttl_ms: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrxResult {
    pub trx_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trx {
    pub trx_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub group_id: String,
    pub sender_pubkey: String,
    /// Encoded payload. JSON text for posts, announcements and profiles.
    pub data: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
    pub version: String,
    pub sender_sign: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: String,
    pub group_id: String,
    pub prev_block_id: String,
    pub producer_pubkey: String,
    pub trxs: Vec<Trx>,
    pub sign: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTrx {
    pub trx_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sender_pubkey: String,
    pub data: serde_json::Value,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedBlock {
    pub block_id: String,
    pub group_id: String,
    pub prev_block_id: String,
    pub producer_pubkey: String,
    pub trxs: Vec<DecodedTrx>,
    pub sign: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub node_publickey: String,
    pub node_status: String,
    pub node_type: String,
    pub node_version: String,
    /// Protocol → connected peer ids.
    pub peers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGroup {
    pub group_id: String,
    pub group_name: String,
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub peer_id: String,
    pub addrs: Vec<String>,
    pub groups: Vec<NetworkGroup>,
    pub nat_type: String,
}

/// Adapted arguments of `GetContent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub group_id: String,
    pub num: i64,
    /// Page after this trx; empty starts from the first (or last) item.
    pub start_trx: String,
    pub reverse: bool,
    /// Only content from these publishers; empty means everyone.
    pub senders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub trx_id: String,
    pub publisher: String,
    pub content: serde_json::Value,
    pub type_url: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentList {
    pub contents: Vec<ContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinGroupResult {
    pub group_id: String,
    pub group_name: String,
    pub owner_pubkey: String,
    pub user_pubkey: String,
    pub consensus_type: String,
    pub encryption_type: String,
    pub cipher_key: String,
    pub app_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveGroupResult {
    pub group_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearGroupDataResult {
    pub group_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub group_name: String,
    pub owner_pubkey: String,
    pub user_pubkey: String,
    pub consensus_type: String,
    pub encryption_type: String,
    pub cipher_key: String,
    pub app_key: String,
    #[serde(with = "int64_string")]
    pub last_updated: i64,
    pub highest_height: u64,
    pub highest_block_id: String,
    pub group_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupList {
    pub groups: Vec<GroupInfo>,
}

/// Outcome of the storage probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageReport {
    pub ok: bool,
    pub entries: usize,
    pub elapsed_ms: u64,
}

// ============================================================================
// JSON params
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceParams {
    pub group_id: String,
    /// `add` or `remove`.
    pub action: String,
    /// `producer` or `user`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProducerParams {
    pub group_id: String,
    pub producer_pubkey: String,
    /// `add` or `remove`.
    pub action: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGroupParams {
    pub group_name: String,
    #[serde(default = "default_consensus")]
    pub consensus_type: String,
    /// `public` or `private`.
    #[serde(default = "default_encryption")]
    pub encryption_type: String,
    #[serde(default)]
    pub app_key: String,
}

fn default_consensus() -> String {
    "poa".to_string()
}

fn default_encryption() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenyUserParams {
    pub group_id: String,
    pub peer_id: String,
    /// `add` or `del`.
    pub action: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileParams {
    pub group_id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub mixin_uid: Option<String>,
}

/// An activity posted to a group.
///
/// ```json
/// {"type": "Add",
///  "object": {"type": "Note", "content": "hello", "name": "greeting"},
///  "target": {"id": "<group id>", "type": "Group"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostParams {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: PostObject,
    pub target: PostTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTarget {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(timestamp: i64) -> Block {
        Block {
            block_id: "b1".into(),
            group_id: "g1".into(),
            prev_block_id: String::new(),
            producer_pubkey: "owner".into(),
            trxs: Vec::new(),
            sign: "s".into(),
            timestamp,
        }
    }

    #[test]
    fn test_timestamp_is_a_decimal_string() {
        let json = serde_json::to_value(block(1_760_000_000_123_456_789)).unwrap();
        assert_eq!(json["timestamp"], "1760000000123456789");

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back.timestamp, 1_760_000_000_123_456_789);
    }

    #[test]
    fn test_timestamp_accepts_an_integer() {
        let mut json = serde_json::to_value(block(0)).unwrap();
        json["timestamp"] = serde_json::json!(42);
        let back: Block = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back.timestamp, 42);

        json["timestamp"] = serde_json::json!("soon");
        assert!(serde_json::from_value::<Block>(json).is_err());
    }
}
