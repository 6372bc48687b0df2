//! Domain records produced by the agency views.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shard::{ShardId, ShardMap};

/// Value stored under a primary's key when it has no secondary.
pub const UNPAIRED: &str = "none";

/// Unique identifier for a server in the cluster.
pub type ServerId = String;

// ── Membership ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Secondary,
}

/// A database server as seen through a DBServers pairing map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    pub role: Role,
    /// Only ever set on primaries.
    pub secondary_id: Option<ServerId>,
    /// Resolved endpoint, only known for Current.
    pub address: Option<String>,
}

impl ServerRecord {
    pub fn primary(id: impl Into<ServerId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Primary,
            secondary_id: None,
            address: None,
        }
    }

    pub fn secondary(id: impl Into<ServerId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Secondary,
            secondary_id: None,
            address: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary
    }

    pub fn is_unpaired(&self) -> bool {
        self.is_primary() && self.secondary_id.is_none()
    }
}

// ── Collections ───────────────────────────────────────────────────

/// A collection's plan document, stored as the JSON body of a leaf keyed by
/// the collection's numeric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDocument {
    pub name: String,
    #[serde(default)]
    pub shards: ShardMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribute_shards_like: Option<String>,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    #[serde(default)]
    pub number_of_shards: u32,
    /// Every other attribute of the plan entry, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_replication_factor() -> u32 {
    1
}

impl CollectionDocument {
    /// The prototype collection this one mirrors, if any. An empty
    /// `distributeShardsLike` counts as unset.
    pub fn prototype(&self) -> Option<&str> {
        self.distribute_shards_like
            .as_deref()
            .filter(|proto| !proto.is_empty())
    }

    /// Leader of a shard.
    pub fn leader_of(&self, shard: &ShardId) -> Option<&str> {
        self.shards
            .get(shard)
            .and_then(|servers| servers.first())
            .map(String::as_str)
    }

    /// Shards on which `server` holds any position, in shard order.
    pub fn shards_for_server(&self, server: &str) -> Vec<ShardId> {
        self.shards
            .iter()
            .filter(|(_, servers)| servers.iter().any(|s| s == server))
            .map(|(shard, _)| shard.clone())
            .collect()
    }
}

// ── Heartbeats ────────────────────────────────────────────────────

/// Replication status a server reports in its heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncStatus {
    ServingSync,
    InSync,
    ServingAsync,
    Syncing,
    Other(String),
}

impl SyncStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SyncStatus::ServingSync => "SERVINGSYNC",
            SyncStatus::InSync => "INSYNC",
            SyncStatus::ServingAsync => "SERVINGASYNC",
            SyncStatus::Syncing => "SYNCING",
            SyncStatus::Other(s) => s,
        }
    }

    pub fn is_in_sync(&self) -> bool {
        matches!(self, SyncStatus::ServingSync | SyncStatus::InSync)
    }

    pub fn is_out_sync(&self) -> bool {
        matches!(self, SyncStatus::ServingAsync | SyncStatus::Syncing)
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, SyncStatus::ServingAsync | SyncStatus::ServingSync)
    }

    pub fn is_inactive(&self) -> bool {
        !self.is_in_sync() && !self.is_out_sync()
    }
}

impl From<String> for SyncStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SERVINGSYNC" => SyncStatus::ServingSync,
            "INSYNC" => SyncStatus::InSync,
            "SERVINGASYNC" => SyncStatus::ServingAsync,
            "SYNCING" => SyncStatus::Syncing,
            _ => SyncStatus::Other(s),
        }
    }
}

impl From<SyncStatus> for String {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last heartbeat a server wrote into `Sync/ServerStates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub server_id: ServerId,
    pub status: SyncStatus,
    /// `None` when the server never reported a parseable time.
    pub last_beat: Option<DateTime<Utc>>,
}
