//! redb table definitions for the agency store.

use redb::TableDefinition;

/// Tree nodes keyed by normalised path; values are JSON-serialized `NodeRecord`s.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// TTL index: leaf path → expiry deadline in unix milliseconds.
pub const EXPIRY: TableDefinition<&str, u64> = TableDefinition::new("expiry");

/// Store-wide counters keyed by name.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the global revision counter.
pub const REVISION_KEY: &str = "revision";
