//! Collection view — shard queries and leader moves.

use agency_core::{CollectionDocument, ShardId, ShardMap};
use agency_routes::{ReadRoute, Route, WriteRoute};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{TopologyError, TopologyResult};

/// Result of a successful `move_shard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardMove {
    pub shard: ShardId,
    pub from: Option<String>,
    pub to: String,
}

/// View over `<scope>/Collections/<database>/<collection id>`.
pub struct CollectionView<R> {
    database: String,
    id: String,
    route: R,
    cas_attempts: u32,
}

impl<R: ReadRoute> CollectionView<R> {
    pub(crate) fn new(database: String, id: String, route: R, cas_attempts: u32) -> Self {
        Self {
            database,
            id,
            route,
            cas_attempts,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw plan document as stored.
    fn raw(&self) -> TopologyResult<Value> {
        let value = self.route.get(true)?;
        if value.as_object().is_some_and(|map| map.is_empty()) {
            return Err(TopologyError::CollectionNotFound {
                database: self.database.clone(),
                collection: self.id.clone(),
            });
        }
        Ok(value)
    }

    fn decode(&self, raw: Value) -> TopologyResult<CollectionDocument> {
        serde_json::from_value(raw).map_err(|e| TopologyError::InvalidDocument {
            path: self.route.path().to_string(),
            message: e.to_string(),
        })
    }

    pub fn info(&self) -> TopologyResult<CollectionDocument> {
        self.decode(self.raw()?)
    }

    /// Shard map in numeric shard order.
    pub fn get_shards(&self) -> TopologyResult<ShardMap> {
        Ok(self.info()?.shards)
    }

    /// Shards on which `server` is leader or follower.
    pub fn get_shards_for_server(&self, server: &str) -> TopologyResult<Vec<ShardId>> {
        Ok(self.info()?.shards_for_server(server))
    }

    /// Leader of `shard`, `None` when the shard is unknown or has no servers.
    pub fn get_server_for_shard(&self, shard: &str) -> TopologyResult<Option<String>> {
        let info = self.info()?;
        Ok(info.leader_of(&ShardId::from(shard)).map(str::to_string))
    }
}

impl<R: WriteRoute> CollectionView<R> {
    /// Make `target` the leader of `shard`.
    ///
    /// The whole document is written back with a compare-and-swap against
    /// the document that was read, retried on concurrent changes.
    ///
    /// If `target` is already a follower of `shard`, it trades places with
    /// the old leader instead of overwriting slot 0, so the old leader stays
    /// on as a follower and no server appears twice. Otherwise the old
    /// leader is replaced. Nothing is written when `target` already leads.
    pub fn move_shard(&self, shard: &str, target: &str) -> TopologyResult<ShardMove> {
        let shard_id = ShardId::from(shard);
        for attempt in 1..=self.cas_attempts {
            let raw = self.raw()?;
            let doc = self.decode(raw.clone())?;
            if let Some(prototype) = doc.prototype() {
                return Err(TopologyError::FollowsPrototype {
                    collection: doc.name.clone(),
                    prototype: prototype.to_string(),
                });
            }
            let Some(servers) = doc.shards.get(&shard_id) else {
                return Err(TopologyError::ShardNotFound {
                    collection: doc.name.clone(),
                    shard: shard.to_string(),
                });
            };

            let from = servers.first().cloned();
            if from.as_deref() == Some(target) {
                debug!(collection = %doc.name, %shard, %target, "already leader");
                return Ok(ShardMove {
                    shard: shard_id,
                    from,
                    to: target.to_string(),
                });
            }

            let mut updated = raw.clone();
            let Some(list) = updated
                .get_mut("shards")
                .and_then(|shards| shards.get_mut(shard))
                .and_then(Value::as_array_mut)
            else {
                return Err(TopologyError::InvalidDocument {
                    path: self.route.path().to_string(),
                    message: format!("shard {shard} is not a server list"),
                });
            };
            let target_value = Value::String(target.to_string());
            match list.iter().position(|server| *server == target_value) {
                Some(index) => list.swap(0, index),
                None if list.is_empty() => list.push(target_value),
                None => list[0] = target_value,
            }

            if self.route.cas(&raw, updated)? {
                info!(
                    database = %self.database,
                    collection = %doc.name,
                    %shard,
                    from = ?from,
                    to = %target,
                    "shard leader moved"
                );
                return Ok(ShardMove {
                    shard: shard_id,
                    from,
                    to: target.to_string(),
                });
            }
            debug!(collection = %doc.name, %shard, attempt, "plan changed underneath, retrying");
        }
        Err(TopologyError::Contended {
            path: self.route.path().to_string(),
            attempts: self.cas_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::databases::DatabasesView;
    use agency_routes::{ReadOnlyRoute, ReadWriteRoute, RouteBuilder};
    use agency_store::{AgencyStore, SharedStore, StoreClient};
    use serde_json::json;

    const PATH: &str = "/arango/Target/Collections/_system/1001";

    fn setup() -> (SharedStore, CollectionView<ReadWriteRoute>) {
        let store = AgencyStore::open_in_memory().unwrap().shared();
        store
            .set(
                PATH,
                json!({"name": "users", "id": "1001", "replicationFactor": 2,
                       "shards": {"s10": ["db3", "db1"], "s2": ["db1", "db2"], "s1": ["db2", "db3"]}}),
                None,
            )
            .unwrap();
        store
            .set(
                "/arango/Target/Collections/_system/1002",
                json!({"name": "follower", "distributeShardsLike": "users",
                       "shards": {"s20": ["db2"]}}),
                None,
            )
            .unwrap();
        let routes = RouteBuilder::new(store.clone()).build().unwrap();
        let mut db = DatabasesView::new(routes.target.collections)
            .select("_system")
            .unwrap()
            .unwrap();
        let view = db.collection("users").unwrap().unwrap();
        (store, view)
    }

    #[test]
    fn shard_queries() {
        let (_, view) = setup();
        let keys: Vec<String> = view.get_shards().unwrap().keys().map(|s| s.to_string()).collect();
        assert_eq!(keys, ["s1", "s2", "s10"]);

        let on_db1: Vec<String> = view
            .get_shards_for_server("db1")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(on_db1, ["s2", "s10"]);

        assert_eq!(view.get_server_for_shard("s10").unwrap().as_deref(), Some("db3"));
        assert_eq!(view.get_server_for_shard("s99").unwrap(), None);
        assert_eq!(view.info().unwrap().replication_factor, 2);
    }

    #[test]
    fn move_shard_replaces_leader_and_keeps_other_fields() {
        let (store, view) = setup();
        let moved = view.move_shard("s2", "db4").unwrap();
        assert_eq!(moved.from.as_deref(), Some("db1"));

        let stored = store.get(PATH, true).unwrap();
        assert_eq!(stored["shards"]["s2"], json!(["db4", "db2"]));
        assert_eq!(stored["shards"]["s1"], json!(["db2", "db3"]));
        assert_eq!(stored["id"], json!("1001"));
    }

    #[test]
    fn move_shard_to_follower_swaps_positions() {
        let (store, view) = setup();
        view.move_shard("s2", "db2").unwrap();
        let stored = store.get(PATH, true).unwrap();
        assert_eq!(stored["shards"]["s2"], json!(["db2", "db1"]));
    }

    #[test]
    fn move_shard_to_current_leader_writes_nothing() {
        let (store, view) = setup();
        let before = store.version(PATH).unwrap();
        let moved = view.move_shard("s1", "db2").unwrap();
        assert_eq!(moved.from.as_deref(), Some("db2"));
        assert_eq!(store.version(PATH).unwrap(), before);
    }

    #[test]
    fn move_shard_rejects_unknown_shard_and_followers() {
        let (store, view) = setup();
        let err = view.move_shard("s7", "db1").unwrap_err();
        assert!(matches!(err, TopologyError::ShardNotFound { .. }));

        let routes = RouteBuilder::new(store).build().unwrap();
        let mut db = DatabasesView::new(routes.target.collections)
            .select("_system")
            .unwrap()
            .unwrap();
        let follower = db.collection("follower").unwrap().unwrap();
        let err = follower.move_shard("s20", "db1").unwrap_err();
        assert!(matches!(err, TopologyError::FollowsPrototype { ref prototype, .. } if prototype == "users"));
    }

    #[test]
    fn removed_collection_is_reported() {
        let (store, view) = setup();
        store.remove(PATH, false).unwrap();
        assert!(matches!(view.info(), Err(TopologyError::CollectionNotFound { .. })));
    }

    #[test]
    fn plan_views_are_read_only() {
        let store = AgencyStore::open_in_memory().unwrap().shared();
        store
            .set("/arango/Plan/Collections/_system/1001", json!({"name": "users"}), None)
            .unwrap();
        let routes = RouteBuilder::new(store).build().unwrap();
        let mut db: crate::DatabaseView<ReadOnlyRoute> = DatabasesView::new(routes.plan.collections)
            .select("_system")
            .unwrap()
            .unwrap();
        let view = db.collection("users").unwrap().unwrap();
        assert!(view.get_shards().unwrap().is_empty());
    }
}
