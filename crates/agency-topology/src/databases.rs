//! Databases and the per-database collection catalog.

use std::collections::BTreeMap;

use agency_core::{CollectionDocument, DEFAULT_CAS_ATTEMPTS, ShardId, ShardPlacement};
use agency_routes::{Bind, ReadRoute, Route, VersionedCache};
use serde_json::Value;
use tracing::{debug, warn};

use crate::collection::CollectionView;
use crate::colocation::{ColocationViolation, check_colocation};
use crate::error::{TopologyError, TopologyResult};

/// Collection name → shard id → leader/followers.
pub type ShardDistribution = BTreeMap<String, BTreeMap<ShardId, ShardPlacement>>;

/// View over a `<scope>/Collections` route.
pub struct DatabasesView<R> {
    route: R,
    version_gated: bool,
    cas_attempts: u32,
}

impl<R: ReadRoute + Bind> DatabasesView<R> {
    pub fn new(route: R) -> Self {
        Self {
            route,
            version_gated: true,
            cas_attempts: DEFAULT_CAS_ATTEMPTS,
        }
    }

    pub fn with_version_gating(mut self, gated: bool) -> Self {
        self.version_gated = gated;
        self
    }

    pub fn with_cas_attempts(mut self, attempts: u32) -> Self {
        self.cas_attempts = attempts.max(1);
        self
    }

    /// Sorted database names.
    pub fn get_list(&self) -> TopologyResult<Vec<String>> {
        Ok(self.route.list()?)
    }

    /// View of one database, or `None` if it does not exist.
    pub fn select(&self, name: &str) -> TopologyResult<Option<DatabaseView<R>>> {
        if !self.get_list()?.iter().any(|db| db == name) {
            debug!(database = %name, "unknown database");
            return Ok(None);
        }
        let route = self.route.child(name)?;
        Ok(Some(DatabaseView {
            name: name.to_string(),
            route,
            catalog: VersionedCache::new(self.version_gated),
            cas_attempts: self.cas_attempts,
        }))
    }
}

/// Decoded collection documents of one database.
#[derive(Debug, Default)]
struct Catalog {
    /// Collection name → collection id.
    by_name: BTreeMap<String, String>,
    /// Collection id → document.
    documents: BTreeMap<String, CollectionDocument>,
}

impl Catalog {
    fn from_value(database: &str, value: Value) -> Self {
        let mut catalog = Catalog::default();
        let Value::Object(entries) = value else {
            return catalog;
        };
        for (id, body) in entries {
            match serde_json::from_value::<CollectionDocument>(body) {
                Ok(doc) => {
                    catalog.by_name.insert(doc.name.clone(), id.clone());
                    catalog.documents.insert(id, doc);
                }
                Err(e) => {
                    warn!(%database, collection_id = %id, error = %e, "skipping unreadable collection plan");
                }
            }
        }
        catalog
    }

    /// A collection by name, or failing that by id.
    fn resolve(&self, name_or_id: &str) -> Option<&CollectionDocument> {
        self.by_name
            .get(name_or_id)
            .and_then(|id| self.documents.get(id))
            .or_else(|| self.documents.get(name_or_id))
    }
}

/// Cached view over `<scope>/Collections/<database>`.
pub struct DatabaseView<R> {
    name: String,
    route: R,
    catalog: VersionedCache<Catalog>,
    cas_attempts: u32,
}

impl<R: ReadRoute + Bind> DatabaseView<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> &R {
        &self.route
    }

    fn catalog(&mut self) -> TopologyResult<&Catalog> {
        let database = self.name.as_str();
        self.catalog.get_or_fetch(&self.route, |route| {
            let value = route.get(true)?;
            Ok::<_, TopologyError>(Catalog::from_value(database, value))
        })
    }

    /// Sorted collection names.
    pub fn get_collections(&mut self) -> TopologyResult<Vec<String>> {
        Ok(self.catalog()?.by_name.keys().cloned().collect())
    }

    /// View of one collection by name, or `None` if no collection has it.
    pub fn collection(&mut self, name: &str) -> TopologyResult<Option<CollectionView<R>>> {
        let Some(id) = self.catalog()?.by_name.get(name).cloned() else {
            debug!(database = %self.name, collection = %name, "unknown collection");
            return Ok(None);
        };
        let route = self.route.child(&id)?;
        Ok(Some(CollectionView::new(
            self.name.clone(),
            id,
            route,
            self.cas_attempts,
        )))
    }

    /// Leader and followers of every shard, per collection.
    pub fn shard_distribution(&mut self) -> TopologyResult<ShardDistribution> {
        let catalog = self.catalog()?;
        Ok(catalog
            .documents
            .values()
            .map(|doc| {
                let shards = doc
                    .shards
                    .iter()
                    .map(|(shard, servers)| (shard.clone(), ShardPlacement::from_servers(servers)))
                    .collect();
                (doc.name.clone(), shards)
            })
            .collect())
    }

    /// Colocation violations of every collection that declares a prototype.
    pub fn check_colocation(&mut self) -> TopologyResult<Vec<ColocationViolation>> {
        let catalog = self.catalog()?;
        let mut followers: Vec<&CollectionDocument> = catalog
            .documents
            .values()
            .filter(|doc| doc.prototype().is_some())
            .collect();
        followers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut violations = Vec::new();
        for follower in followers {
            let Some(prototype_ref) = follower.prototype() else {
                continue;
            };
            match catalog.resolve(prototype_ref) {
                Some(prototype) => violations.extend(check_colocation(follower, prototype)),
                None => violations.push(ColocationViolation::MissingPrototype {
                    collection: follower.name.clone(),
                    prototype: prototype_ref.to_string(),
                }),
            }
        }
        if !violations.is_empty() {
            warn!(database = %self.name, count = violations.len(), "colocation violations found");
        }
        Ok(violations)
    }
}
