//! Route tree builder.
//!
//! Binds every known level of the agency hierarchy once, at facade
//! construction time. No directory listing happens here; per-collection
//! routes are bound lazily by the topology views, or eagerly with
//! [`add_levels_for_dbs`].

use std::collections::BTreeMap;

use agency_store::SharedStore;
use tracing::debug;

use crate::error::RouteResult;
use crate::route::{
    Bind, ListOnlyRoute, ListRoute, ReadOnlyRoute, ReadWriteRoute, Route, add_level,
};

/// Root segment under which the agency trees live.
pub const DEFAULT_PREFIX: &str = "arango";

/// Desired state. Writable by operators and controllers.
#[derive(Debug, Clone)]
pub struct TargetRoutes {
    pub root: ReadWriteRoute,
    pub db_servers: ReadWriteRoute,
    pub coordinators: ReadWriteRoute,
    pub collections: ReadWriteRoute,
    pub to_do: ListOnlyRoute,
    pub pending: ListOnlyRoute,
    pub failed: ListOnlyRoute,
    pub finished: ListOnlyRoute,
}

/// Configuration committed for servers to enact.
#[derive(Debug, Clone)]
pub struct PlanRoutes {
    pub root: ReadOnlyRoute,
    pub db_servers: ReadOnlyRoute,
    pub coordinators: ReadOnlyRoute,
    pub collections: ReadOnlyRoute,
}

/// State servers have reported back.
#[derive(Debug, Clone)]
pub struct CurrentRoutes {
    pub root: ReadOnlyRoute,
    pub db_servers: ReadOnlyRoute,
    pub coordinators: ReadOnlyRoute,
    pub collections: ReadOnlyRoute,
    pub servers_registered: ReadOnlyRoute,
}

/// Liveness heartbeats.
#[derive(Debug, Clone)]
pub struct SyncRoutes {
    pub root: ReadOnlyRoute,
    pub server_states: ReadOnlyRoute,
    pub heartbeat_interval_ms: ReadOnlyRoute,
}

/// The full bound route tree.
#[derive(Debug, Clone)]
pub struct AgencyRoutes {
    pub target: TargetRoutes,
    pub plan: PlanRoutes,
    pub current: CurrentRoutes,
    pub sync: SyncRoutes,
}

impl AgencyRoutes {
    /// Every bound route as `(name, path)`, in tree order.
    pub fn paths(&self) -> Vec<(&'static str, String)> {
        let t = &self.target;
        let p = &self.plan;
        let c = &self.current;
        let s = &self.sync;
        [
            ("target", t.root.path()),
            ("target.db_servers", t.db_servers.path()),
            ("target.coordinators", t.coordinators.path()),
            ("target.collections", t.collections.path()),
            ("target.to_do", t.to_do.path()),
            ("target.pending", t.pending.path()),
            ("target.failed", t.failed.path()),
            ("target.finished", t.finished.path()),
            ("plan", p.root.path()),
            ("plan.db_servers", p.db_servers.path()),
            ("plan.coordinators", p.coordinators.path()),
            ("plan.collections", p.collections.path()),
            ("current", c.root.path()),
            ("current.db_servers", c.db_servers.path()),
            ("current.coordinators", c.coordinators.path()),
            ("current.collections", c.collections.path()),
            ("current.servers_registered", c.servers_registered.path()),
            ("sync", s.root.path()),
            ("sync.server_states", s.server_states.path()),
            ("sync.heartbeat_interval_ms", s.heartbeat_interval_ms.path()),
        ]
        .into_iter()
        .map(|(name, path)| (name, path.to_string()))
        .collect()
    }
}

/// Builds an [`AgencyRoutes`] tree over one shared store.
pub struct RouteBuilder {
    store: SharedStore,
    prefix: String,
}

impl RouteBuilder {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Set the root segment (default [`DEFAULT_PREFIX`]).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn build(&self) -> RouteResult<AgencyRoutes> {
        let root = ReadWriteRoute::root(self.store.clone(), &self.prefix)?;

        let target: ReadWriteRoute = root.child("Target")?;
        let target = TargetRoutes {
            db_servers: target.child("DBServers")?,
            coordinators: target.child("Coordinators")?,
            collections: target.child("Collections")?,
            to_do: add_level(&target, "ToDo")?,
            pending: add_level(&target, "Pending")?,
            failed: add_level(&target, "Failed")?,
            finished: add_level(&target, "Finished")?,
            root: target,
        };

        let plan: ReadOnlyRoute = add_level(&root, "Plan")?;
        let plan = PlanRoutes {
            db_servers: plan.child("DBServers")?,
            coordinators: plan.child("Coordinators")?,
            collections: plan.child("Collections")?,
            root: plan,
        };

        let current: ReadOnlyRoute = add_level(&root, "Current")?;
        let current = CurrentRoutes {
            db_servers: current.child("DBServers")?,
            coordinators: current.child("Coordinators")?,
            collections: current.child("Collections")?,
            servers_registered: current.child("ServersRegistered")?,
            root: current,
        };

        let sync: ReadOnlyRoute = add_level(&root, "Sync")?;
        let sync = SyncRoutes {
            server_states: sync.child("ServerStates")?,
            heartbeat_interval_ms: sync.child("HeartbeatIntervalMs")?,
            root: sync,
        };

        debug!(prefix = %root.path(), "agency route tree bound");
        Ok(AgencyRoutes {
            target,
            plan,
            current,
            sync,
        })
    }
}

/// Per-collection routes keyed by database name, then collection id.
#[derive(Debug, Clone)]
pub struct CollectionRoutes<R> {
    databases: BTreeMap<String, BTreeMap<String, R>>,
}

impl<R> CollectionRoutes<R> {
    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn collections(&self, database: &str) -> impl Iterator<Item = (&str, &R)> {
        self.databases
            .get(database)
            .into_iter()
            .flat_map(|collections| collections.iter().map(|(id, route)| (id.as_str(), route)))
    }

    /// Total number of bound collection routes.
    fn len(&self) -> usize {
        self.databases.values().map(BTreeMap::len).sum()
    }
}

/// Eagerly bind one route per collection below a `Collections` route.
///
/// Lists the databases under `base`, then each database's collection ids.
/// The child routes carry `base`'s capability set, so write access exists
/// only when `base` is a Target route. Costs one listing per database.
pub fn add_levels_for_dbs<R>(base: &R) -> RouteResult<CollectionRoutes<R>>
where
    R: ListRoute + Bind,
{
    let mut databases = BTreeMap::new();
    for database in base.list()? {
        let db_route = base.child(&database)?;
        let mut collections = BTreeMap::new();
        for id in db_route.list()? {
            let route = db_route.child(&id)?;
            collections.insert(id, route);
        }
        databases.insert(database, collections);
    }
    let routes = CollectionRoutes { databases };
    debug!(base = %base.path(), collections = routes.len(), "collection routes bound");
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{ReadRoute, WriteRoute};
    use agency_store::AgencyStore;
    use serde_json::json;

    fn store() -> SharedStore {
        AgencyStore::open_in_memory().unwrap().shared()
    }

    #[test]
    fn builds_known_hierarchy_under_prefix() {
        let routes = RouteBuilder::new(store()).build().unwrap();
        assert_eq!(routes.target.db_servers.path(), "/arango/Target/DBServers");
        assert_eq!(routes.plan.collections.path(), "/arango/Plan/Collections");
        assert_eq!(
            routes.current.servers_registered.path(),
            "/arango/Current/ServersRegistered"
        );
        assert_eq!(
            routes.sync.heartbeat_interval_ms.path(),
            "/arango/Sync/HeartbeatIntervalMs"
        );
        assert_eq!(routes.paths().len(), 20);
    }

    #[test]
    fn custom_prefix() {
        let routes = RouteBuilder::new(store())
            .with_prefix("cluster-a")
            .build()
            .unwrap();
        assert_eq!(routes.target.to_do.path(), "/cluster-a/Target/ToDo");
    }

    #[test]
    fn build_does_not_touch_the_store() {
        let store = store();
        RouteBuilder::new(store.clone()).build().unwrap();
        assert_eq!(store.get("/", true).unwrap(), json!({}));
    }

    #[test]
    fn eager_collection_routes_match_lazy_binding() {
        let store = store();
        let routes = RouteBuilder::new(store).build().unwrap();
        let collections = &routes.target.collections;
        let doc = json!({"name": "orders", "shards": {}});
        collections.child("_system").unwrap().child("1001").unwrap().set(doc.clone()).unwrap();
        collections.child("_system").unwrap().child("1002").unwrap().set(json!({"name": "users"})).unwrap();
        collections.child("shop").unwrap().child("2001").unwrap().set(json!({"name": "items"})).unwrap();

        let eager = add_levels_for_dbs(collections).unwrap();
        assert_eq!(eager.databases().collect::<Vec<_>>(), ["_system", "shop"]);
        assert_eq!(eager.len(), 3);

        let lazy = collections.child("_system").unwrap().child("1001").unwrap();
        let (id, bound) = eager.collections("_system").next().unwrap();
        assert_eq!(id, "1001");
        assert_eq!(bound, &lazy);
        assert_eq!(bound.get(true).unwrap(), doc);

        let plan = add_levels_for_dbs(&routes.plan.collections).unwrap();
        assert_eq!(plan.databases().count(), 0);
    }
}
