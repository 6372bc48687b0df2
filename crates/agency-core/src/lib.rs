//! agency-core — types shared by every agency crate.
//!
//! Holds the domain records the views produce (server roles, shard maps,
//! collection documents, heartbeat records), the numeric shard ordering, and
//! the `agency.toml` configuration.

pub mod config;
pub mod shard;
pub mod types;

pub use config::{AgencyConfig, DEFAULT_CAS_ATTEMPTS};
pub use shard::{ShardId, ShardMap, ShardPlacement, sort_shard_names};
pub use types::*;
