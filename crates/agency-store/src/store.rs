//! AgencyStore — redb-backed hierarchical coordination store.
//!
//! Implements [`StoreClient`] over three tables (see [`crate::tables`]).
//! Every mutation runs in a single redb write transaction, so `cas` is
//! atomic with respect to every other writer on the same database.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, Table, WriteTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::client::{CasOptions, SharedStore, StoreClient};
use crate::error::{StoreError, StoreResult};
use crate::path::{self, ROOT};
use crate::tables::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Directory,
    Leaf(Value),
}

/// One row of the `nodes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NodeRecord {
    node: Node,
    /// Revision at which the subtree rooted here last changed.
    revision: u64,
}

impl NodeRecord {
    fn directory(revision: u64) -> Self {
        Self {
            node: Node::Directory,
            revision,
        }
    }

    fn is_directory(&self) -> bool {
        self.node == Node::Directory
    }
}

/// Thread-safe coordination store backed by redb.
#[derive(Clone)]
pub struct AgencyStore {
    db: Arc<Database>,
}

impl AgencyStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "agency store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory agency store opened");
        Ok(store)
    }

    /// Wrap this store in the shared handle routes expect.
    pub fn shared(self) -> SharedStore {
        Arc::new(self)
    }

    /// Create all tables and the root directory if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut tables = WriteTables::open(&txn)?;
            if tables.load(ROOT)?.is_none() {
                tables.save(ROOT, &NodeRecord::directory(0))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` inside a write transaction, purging expired keys first.
    fn write<T>(&self, f: impl FnOnce(&mut WriteTables<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let result = {
            let mut tables = WriteTables::open(&txn)?;
            tables.purge_expired(now_millis())?;
            f(&mut tables)?
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(result)
    }

    /// Run `f` against a read snapshot of the `nodes` table.
    fn read<T>(
        &self,
        f: impl FnOnce(&redb::ReadOnlyTable<&'static str, &'static [u8]>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.purge_if_due()?;
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
        f(&nodes)
    }

    /// Expired keys must disappear from reads, so purge them before reading.
    fn purge_if_due(&self) -> StoreResult<()> {
        let now = now_millis();
        let due = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let expiry = txn.open_table(EXPIRY).map_err(map_err!(Table))?;
            let mut due = false;
            for entry in expiry.iter().map_err(map_err!(Read))? {
                let (_, deadline) = entry.map_err(map_err!(Read))?;
                if deadline.value() <= now {
                    due = true;
                    break;
                }
            }
            due
        };
        if due {
            self.write(|_| Ok(()))?;
        }
        Ok(())
    }
}

impl StoreClient for AgencyStore {
    fn get(&self, path: &str, recursive: bool) -> StoreResult<Value> {
        let path = path::normalize(path)?;
        let value = self.read(|nodes| match load_node(nodes, &path)? {
            None => Ok(Value::Object(Map::new())),
            Some(NodeRecord {
                node: Node::Leaf(value),
                ..
            }) => Ok(value),
            Some(_) => render_directory(nodes, &path, recursive),
        })?;
        trace!(%path, recursive, "get");
        Ok(value)
    }

    fn set(&self, path: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        let path = path::normalize(path)?;
        if path == ROOT {
            return Err(StoreError::InvalidPath("cannot set the root".to_string()));
        }
        self.write(|tables| {
            let revision = tables.next_revision()?;
            tables.write_leaf(&path, value, ttl, revision)
        })?;
        debug!(%path, ?ttl, "key stored");
        Ok(())
    }

    fn remove(&self, path: &str, recursive: bool) -> StoreResult<()> {
        let path = path::normalize(path)?;
        if path == ROOT {
            return Err(StoreError::InvalidPath("cannot remove the root".to_string()));
        }
        self.write(|tables| match tables.load(&path)? {
            None => Err(StoreError::KeyNotFound(path.clone())),
            Some(record) if record.is_directory() && !recursive => {
                Err(StoreError::NotAFile(path.clone()))
            }
            Some(_) => {
                let revision = tables.next_revision()?;
                tables.remove_subtree(&path)?;
                tables.stamp_ancestors(&path, revision)
            }
        })?;
        debug!(%path, recursive, "key removed");
        Ok(())
    }

    fn cas(&self, path: &str, old: &Value, new: Value, options: CasOptions) -> StoreResult<bool> {
        let path = path::normalize(path)?;
        if path == ROOT {
            return Err(StoreError::InvalidPath("cannot set the root".to_string()));
        }
        let swapped = self.write(|tables| {
            let matches = matches!(
                tables.load(&path)?,
                Some(NodeRecord { node: Node::Leaf(ref current), .. }) if current == old
            );
            if matches {
                let revision = tables.next_revision()?;
                tables.write_leaf(&path, new, options.ttl, revision)?;
                Ok(true)
            } else if options.throw_on_mismatch {
                Err(StoreError::CasMismatch(path.clone()))
            } else {
                Ok(false)
            }
        })?;
        debug!(%path, swapped, "compare-and-swap");
        Ok(swapped)
    }

    fn create_directory(&self, path: &str) -> StoreResult<()> {
        let path = path::normalize(path)?;
        if path == ROOT {
            return Err(StoreError::AlreadyExists(path));
        }
        self.write(|tables| {
            if tables.load(&path)?.is_some() {
                return Err(StoreError::AlreadyExists(path.clone()));
            }
            for ancestor in path::ancestors(&path) {
                if let Some(record) = tables.load(&ancestor)?
                    && !record.is_directory()
                {
                    return Err(StoreError::NotADirectory(ancestor));
                }
            }
            let revision = tables.next_revision()?;
            tables.stamp_ancestors(&path, revision)?;
            tables.save(&path, &NodeRecord::directory(revision))
        })?;
        debug!(%path, "directory created");
        Ok(())
    }

    fn list(&self, path: &str) -> StoreResult<Vec<String>> {
        let path = path::normalize(path)?;
        self.read(|nodes| match load_node(nodes, &path)? {
            None => Ok(Vec::new()),
            Some(record) if !record.is_directory() => Err(StoreError::NotADirectory(path.clone())),
            Some(_) => {
                let prefix = path::child_prefix(&path);
                Ok(descendants(nodes, &path)?
                    .into_iter()
                    .filter_map(|(key, _)| {
                        let name = &key[prefix.len()..];
                        (!name.contains('/')).then(|| name.to_string())
                    })
                    .collect())
            }
        })
    }

    fn version(&self, path: &str) -> StoreResult<u64> {
        let path = path::normalize(path)?;
        self.read(|nodes| Ok(load_node(nodes, &path)?.map_or(0, |record| record.revision)))
    }
}

// ── Write-side table access ────────────────────────────────────────

struct WriteTables<'txn> {
    nodes: Table<'txn, &'static str, &'static [u8]>,
    expiry: Table<'txn, &'static str, u64>,
    meta: Table<'txn, &'static str, u64>,
}

impl<'txn> WriteTables<'txn> {
    fn open(txn: &'txn WriteTransaction) -> StoreResult<Self> {
        Ok(Self {
            nodes: txn.open_table(NODES).map_err(map_err!(Table))?,
            expiry: txn.open_table(EXPIRY).map_err(map_err!(Table))?,
            meta: txn.open_table(META).map_err(map_err!(Table))?,
        })
    }

    fn load(&self, path: &str) -> StoreResult<Option<NodeRecord>> {
        load_node(&self.nodes, path)
    }

    fn save(&mut self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        self.nodes
            .insert(path, value.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    fn next_revision(&mut self) -> StoreResult<u64> {
        let current = self
            .meta
            .get(REVISION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        self.meta
            .insert(REVISION_KEY, next)
            .map_err(map_err!(Write))?;
        Ok(next)
    }

    /// Stamp `revision` on every proper ancestor of `path`, turning missing
    /// or leaf ancestors into directories.
    fn stamp_ancestors(&mut self, path: &str, revision: u64) -> StoreResult<()> {
        for ancestor in path::ancestors(path) {
            let record = match self.load(&ancestor)? {
                Some(mut record) if record.is_directory() => {
                    record.revision = revision;
                    record
                }
                Some(_) => {
                    self.expiry
                        .remove(ancestor.as_str())
                        .map_err(map_err!(Write))?;
                    NodeRecord::directory(revision)
                }
                None => NodeRecord::directory(revision),
            };
            self.save(&ancestor, &record)?;
        }
        Ok(())
    }

    fn write_leaf(
        &mut self,
        path: &str,
        value: Value,
        ttl: Option<Duration>,
        revision: u64,
    ) -> StoreResult<()> {
        self.stamp_ancestors(path, revision)?;
        if self.load(path)?.is_some_and(|record| record.is_directory()) {
            self.remove_descendants(path)?;
        }
        self.save(
            path,
            &NodeRecord {
                node: Node::Leaf(value),
                revision,
            },
        )?;
        match ttl {
            Some(ttl) => {
                let deadline = now_millis().saturating_add(ttl.as_millis() as u64);
                self.expiry
                    .insert(path, deadline)
                    .map_err(map_err!(Write))?;
            }
            None => {
                self.expiry.remove(path).map_err(map_err!(Write))?;
            }
        }
        Ok(())
    }

    fn remove_descendants(&mut self, path: &str) -> StoreResult<()> {
        let keys: Vec<String> = descendants(&self.nodes, path)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        for key in &keys {
            self.nodes.remove(key.as_str()).map_err(map_err!(Write))?;
            self.expiry.remove(key.as_str()).map_err(map_err!(Write))?;
        }
        Ok(())
    }

    fn remove_subtree(&mut self, path: &str) -> StoreResult<()> {
        self.remove_descendants(path)?;
        self.nodes.remove(path).map_err(map_err!(Write))?;
        self.expiry.remove(path).map_err(map_err!(Write))?;
        Ok(())
    }

    fn purge_expired(&mut self, now: u64) -> StoreResult<()> {
        let mut due = Vec::new();
        for entry in self.expiry.iter().map_err(map_err!(Read))? {
            let (key, deadline) = entry.map_err(map_err!(Read))?;
            if deadline.value() <= now {
                due.push(key.value().to_string());
            }
        }
        if due.is_empty() {
            return Ok(());
        }
        let revision = self.next_revision()?;
        for key in &due {
            self.remove_subtree(key)?;
            self.stamp_ancestors(key, revision)?;
            debug!(path = %key, "key expired");
        }
        Ok(())
    }
}

// ── Read helpers shared by both transaction kinds ──────────────────

fn load_node<T>(nodes: &T, path: &str) -> StoreResult<Option<NodeRecord>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match nodes.get(path).map_err(map_err!(Read))? {
        Some(guard) => {
            let record: NodeRecord =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// All nodes strictly below `path`, in key order (parents before children).
fn descendants<T>(nodes: &T, path: &str) -> StoreResult<Vec<(String, NodeRecord)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let prefix = path::child_prefix(path);
    let mut results = Vec::new();
    for entry in nodes.range(prefix.as_str()..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        let key = key.value();
        if !key.starts_with(&prefix) {
            break;
        }
        if key == path {
            continue;
        }
        let record: NodeRecord =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        results.push((key.to_string(), record));
    }
    Ok(results)
}

fn render_directory<T>(nodes: &T, path: &str, recursive: bool) -> StoreResult<Value>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let prefix = path::child_prefix(path);
    let mut root = Map::new();
    for (key, record) in descendants(nodes, path)? {
        let relative = &key[prefix.len()..];
        if !recursive && relative.contains('/') {
            continue;
        }
        let rendered = match record.node {
            Node::Directory => Value::Object(Map::new()),
            Node::Leaf(value) => value,
        };
        insert_rendered(&mut root, relative, rendered);
    }
    Ok(Value::Object(root))
}

/// Place `value` at the `/`-separated `relative` position below `root`.
/// Parents are rendered before their children, so every intermediate
/// object already exists.
fn insert_rendered(root: &mut Map<String, Value>, relative: &str, value: Value) {
    let mut segments: Vec<&str> = relative.split('/').collect();
    let Some(last) = segments.pop() else { return };
    let mut cursor = root;
    for segment in segments {
        match cursor.get_mut(segment).and_then(Value::as_object_mut) {
            Some(next) => cursor = next,
            None => return,
        }
    }
    cursor.insert(last.to_string(), value);
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
