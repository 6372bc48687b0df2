//! The store client contract consumed by every route.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::StoreResult;

/// Shared handle to a store. Routes hold clones of this; nothing else does.
pub type SharedStore = Arc<dyn StoreClient>;

/// Extra knobs for [`StoreClient::cas`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CasOptions {
    /// Expire the new value after this long.
    pub ttl: Option<Duration>,
    /// Return [`StoreError::CasMismatch`](crate::StoreError::CasMismatch)
    /// instead of `Ok(false)` when the stored value differs.
    pub throw_on_mismatch: bool,
}

/// Operations a hierarchical, versioned coordination store exposes.
///
/// Paths are `/`-delimited. Reads never fail for missing keys: an absent
/// path reads as an empty object.
pub trait StoreClient: Send + Sync {
    /// Subtree rooted at `path`. A leaf yields its value, a directory an
    /// object of its children. Non-recursive reads render subdirectories as
    /// empty objects.
    fn get(&self, path: &str, recursive: bool) -> StoreResult<Value>;

    /// Upsert a leaf, creating missing ancestors as directories.
    fn set(&self, path: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete a leaf, or a directory when `recursive` is set.
    fn remove(&self, path: &str, recursive: bool) -> StoreResult<()>;

    /// Replace `old` with `new` only if the leaf at `path` currently equals `old`.
    fn cas(&self, path: &str, old: &Value, new: Value, options: CasOptions) -> StoreResult<bool>;

    /// Create an empty directory. Fails if anything exists at `path`.
    fn create_directory(&self, path: &str) -> StoreResult<()>;

    /// Sorted names of the immediate children of a directory.
    fn list(&self, path: &str) -> StoreResult<Vec<String>>;

    /// Revision at which the subtree rooted at `path` last changed, 0 if absent.
    fn version(&self, path: &str) -> StoreResult<u64>;
}
