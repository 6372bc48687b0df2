//! Shard colocation checks for `distributeShardsLike`.
//!
//! A follower collection must mirror its prototype's layout: same
//! replication factor, same number of shards, and after sorting both shard
//! lists by numeric suffix, the same server list at every position.
//! Mismatches are reported, never repaired.

use std::fmt;

use agency_core::{CollectionDocument, ShardId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColocationViolation {
    MissingPrototype {
        collection: String,
        prototype: String,
    },
    ReplicationFactor {
        collection: String,
        prototype: String,
        expected: u32,
        found: u32,
    },
    NumberOfShards {
        collection: String,
        prototype: String,
        expected: u32,
        found: u32,
    },
    ShardCount {
        collection: String,
        prototype: String,
        expected: usize,
        found: usize,
    },
    ShardServers {
        collection: String,
        prototype: String,
        position: usize,
        shard: ShardId,
        prototype_shard: ShardId,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl fmt::Display for ColocationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrototype {
                collection,
                prototype,
            } => write!(f, "{collection}: prototype {prototype} does not exist"),
            Self::ReplicationFactor {
                collection,
                prototype,
                expected,
                found,
            } => write!(
                f,
                "{collection}: replicationFactor {found}, {prototype} has {expected}"
            ),
            Self::NumberOfShards {
                collection,
                prototype,
                expected,
                found,
            } => write!(
                f,
                "{collection}: numberOfShards {found}, {prototype} has {expected}"
            ),
            Self::ShardCount {
                collection,
                prototype,
                expected,
                found,
            } => write!(f, "{collection}: {found} shards, {prototype} has {expected}"),
            Self::ShardServers {
                collection,
                prototype,
                position,
                shard,
                prototype_shard,
                expected,
                found,
            } => write!(
                f,
                "{collection}: shard {shard} (position {position}) on {found:?}, \
                 {prototype}/{prototype_shard} on {expected:?}"
            ),
        }
    }
}

/// Compare `follower` against the `prototype` it declares.
pub fn check_colocation(
    follower: &CollectionDocument,
    prototype: &CollectionDocument,
) -> Vec<ColocationViolation> {
    let collection = &follower.name;
    let proto = &prototype.name;
    let mut violations = Vec::new();

    if follower.replication_factor != prototype.replication_factor {
        violations.push(ColocationViolation::ReplicationFactor {
            collection: collection.clone(),
            prototype: proto.clone(),
            expected: prototype.replication_factor,
            found: follower.replication_factor,
        });
    }
    if follower.number_of_shards != prototype.number_of_shards {
        violations.push(ColocationViolation::NumberOfShards {
            collection: collection.clone(),
            prototype: proto.clone(),
            expected: prototype.number_of_shards,
            found: follower.number_of_shards,
        });
    }
    if follower.shards.len() != prototype.shards.len() {
        violations.push(ColocationViolation::ShardCount {
            collection: collection.clone(),
            prototype: proto.clone(),
            expected: prototype.shards.len(),
            found: follower.shards.len(),
        });
    }

    // ShardMap iterates in numeric shard order.
    for (position, ((shard, found), (prototype_shard, expected))) in
        follower.shards.iter().zip(prototype.shards.iter()).enumerate()
    {
        if found != expected {
            violations.push(ColocationViolation::ShardServers {
                collection: collection.clone(),
                prototype: proto.clone(),
                position,
                shard: shard.clone(),
                prototype_shard: prototype_shard.clone(),
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }

    violations
}
