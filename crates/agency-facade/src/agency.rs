//! The `Agency` facade.

use std::fmt;

use agency_core::AgencyConfig;
use agency_health::HeartbeatMonitor;
use agency_membership::{CoordinatorsView, DbServersView, RemoveOutcome};
use agency_routes::{
    AgencyRoutes, ListRoute, ReadOnlyRoute, ReadWriteRoute, RouteBuilder,
};
use agency_store::{AgencyStore, SharedStore};
use agency_topology::{DatabasesView, ShardMove};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{FacadeError, FacadeResult};

/// Which of the three topology trees to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Target,
    Plan,
    Current,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Target => "Target",
            Scope::Plan => "Plan",
            Scope::Current => "Current",
        })
    }
}

/// What `remove_server` removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "removed", rename_all = "snake_case")]
pub enum RemovedServer {
    Primary { demoted: Option<String> },
    Secondary { primary: String },
    Coordinator,
    NotFound,
}

/// Supervision job ids in `Target/{ToDo,Pending,Failed,Finished}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisionState {
    pub to_do: Vec<String>,
    pub pending: Vec<String>,
    pub failed: Vec<String>,
    pub finished: Vec<String>,
}

pub struct Agency {
    store: SharedStore,
    config: AgencyConfig,
    routes: AgencyRoutes,
    db_servers: DbServersView<ReadWriteRoute>,
    coordinators: CoordinatorsView<ReadWriteRoute>,
    heartbeats: HeartbeatMonitor<ReadOnlyRoute>,
}

impl Agency {
    /// Bind the route tree over `store` and set up the Target views.
    pub fn new(store: SharedStore, config: &AgencyConfig) -> FacadeResult<Self> {
        let routes = RouteBuilder::new(store.clone())
            .with_prefix(config.store.prefix.as_str())
            .build()?;

        let db_servers = DbServersView::new(routes.target.db_servers.clone())
            .with_version_gating(config.cache.version_gated)
            .with_cas_attempts(config.mutations.cas_attempts);
        let coordinators = CoordinatorsView::new(routes.target.coordinators.clone());
        let heartbeats = HeartbeatMonitor::new(
            routes.sync.server_states.clone(),
            &routes.sync.heartbeat_interval_ms,
            config.health.default_heartbeat_interval(),
        )?
        .with_stale_multiplier(config.health.stale_multiplier)
        .with_version_gating(config.cache.version_gated);

        info!(prefix = %config.store.prefix, "agency facade ready");
        Ok(Self {
            store,
            config: config.clone(),
            routes,
            db_servers,
            coordinators,
            heartbeats,
        })
    }

    /// Open the store `config` describes (on disk, or in memory when no path
    /// is set) and build the facade over it.
    pub fn open(config: &AgencyConfig) -> FacadeResult<Self> {
        let store = match &config.store.path {
            Some(path) => AgencyStore::open(path)?,
            None => AgencyStore::open_in_memory()?,
        };
        Self::new(store.shared(), config)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn routes(&self) -> &AgencyRoutes {
        &self.routes
    }

    pub fn config(&self) -> &AgencyConfig {
        &self.config
    }

    // ── Views ──────────────────────────────────────────────────────

    /// The writable Target DBServers view the mutations go through.
    pub fn target_db_servers(&mut self) -> &mut DbServersView<ReadWriteRoute> {
        &mut self.db_servers
    }

    /// Read-only DBServers view of `scope`. Current joins registered
    /// endpoints.
    pub fn db_servers(&self, scope: Scope) -> DbServersView<ReadOnlyRoute> {
        let view = match scope {
            Scope::Target => DbServersView::new(self.routes.target.db_servers.read_only()),
            Scope::Plan => DbServersView::new(self.routes.plan.db_servers.clone()),
            Scope::Current => DbServersView::new(self.routes.current.db_servers.clone())
                .with_registry(self.routes.current.servers_registered.clone()),
        };
        view.with_version_gating(self.config.cache.version_gated)
    }

    pub fn coordinators(&self, scope: Scope) -> CoordinatorsView<ReadOnlyRoute> {
        CoordinatorsView::new(match scope {
            Scope::Target => self.routes.target.coordinators.read_only(),
            Scope::Plan => self.routes.plan.coordinators.clone(),
            Scope::Current => self.routes.current.coordinators.clone(),
        })
    }

    /// Read-only databases view of `scope`.
    pub fn databases(&self, scope: Scope) -> DatabasesView<ReadOnlyRoute> {
        let route = match scope {
            Scope::Target => self.routes.target.collections.read_only(),
            Scope::Plan => self.routes.plan.collections.clone(),
            Scope::Current => self.routes.current.collections.clone(),
        };
        DatabasesView::new(route)
            .with_version_gating(self.config.cache.version_gated)
            .with_cas_attempts(self.config.mutations.cas_attempts)
    }

    /// Writable Target databases view, for shard moves.
    pub fn target_databases(&self) -> DatabasesView<ReadWriteRoute> {
        DatabasesView::new(self.routes.target.collections.clone())
            .with_version_gating(self.config.cache.version_gated)
            .with_cas_attempts(self.config.mutations.cas_attempts)
    }

    pub fn heartbeats(&mut self) -> &mut HeartbeatMonitor<ReadOnlyRoute> {
        &mut self.heartbeats
    }

    // ── Membership dispatch ────────────────────────────────────────

    pub fn add_primary(&mut self, id: &str) -> FacadeResult<()> {
        Ok(self.db_servers.add_primary(id)?)
    }

    pub fn add_secondary(&mut self, id: &str, primary_id: &str) -> FacadeResult<()> {
        Ok(self.db_servers.add_secondary(id, primary_id)?)
    }

    pub fn add_pair(&mut self, primary_id: &str, secondary_id: &str) -> FacadeResult<()> {
        Ok(self.db_servers.add_pair(primary_id, secondary_id)?)
    }

    pub fn add_coordinator(&mut self, id: &str) -> FacadeResult<()> {
        Ok(self.coordinators.add(id)?)
    }

    /// Remove a server from Target, whichever kind it is.
    ///
    /// DBServers are tried first; an id unknown there is removed from the
    /// coordinators.
    pub fn remove_server(&mut self, id: &str) -> FacadeResult<RemovedServer> {
        let removed = match self.db_servers.remove_server(id)? {
            RemoveOutcome::RemovedPrimary { demoted } => RemovedServer::Primary { demoted },
            RemoveOutcome::DetachedSecondary { primary } => RemovedServer::Secondary { primary },
            RemoveOutcome::NotFound => {
                debug!(server_id = %id, "not a DBServer, trying coordinators");
                if self.coordinators.remove(id)? {
                    RemovedServer::Coordinator
                } else {
                    RemovedServer::NotFound
                }
            }
        };
        Ok(removed)
    }

    // ── Topology ───────────────────────────────────────────────────

    /// Move the leader of `shard` in a Target collection to `target`.
    pub fn move_shard(
        &self,
        database: &str,
        collection: &str,
        shard: &str,
        target: &str,
    ) -> FacadeResult<ShardMove> {
        let mut db = self
            .target_databases()
            .select(database)?
            .ok_or_else(|| FacadeError::UnknownDatabase(database.to_string()))?;
        let view = db
            .collection(collection)?
            .ok_or_else(|| FacadeError::UnknownCollection {
                database: database.to_string(),
                collection: collection.to_string(),
            })?;
        Ok(view.move_shard(shard, target)?)
    }

    /// Job ids in each supervision queue.
    pub fn supervision_state(&self) -> FacadeResult<SupervisionState> {
        let target = &self.routes.target;
        Ok(SupervisionState {
            to_do: target.to_do.list()?,
            pending: target.pending.list()?,
            failed: target.failed.list()?,
            finished: target.finished.list()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agency_store::StoreClient;
    use serde_json::json;

    fn agency() -> Agency {
        Agency::open(&AgencyConfig::default()).unwrap()
    }

    #[test]
    fn remove_server_falls_back_to_coordinators() {
        let mut agency = agency();
        agency.add_coordinator("Coord1").unwrap();
        assert_eq!(agency.remove_server("Coord1").unwrap(), RemovedServer::Coordinator);
        assert_eq!(agency.remove_server("Coord1").unwrap(), RemovedServer::NotFound);
        assert!(agency.coordinators(Scope::Target).get_list().unwrap().is_empty());
    }

    #[test]
    fn supervision_state_lists_jobs() {
        let agency = agency();
        agency
            .store()
            .set("/arango/Target/ToDo/1", json!({"type": "moveShard"}), None)
            .unwrap();
        agency
            .store()
            .set("/arango/Target/Finished/0", json!({"type": "addFollower"}), None)
            .unwrap();
        let state = agency.supervision_state().unwrap();
        assert_eq!(state.to_do, ["1"]);
        assert!(state.pending.is_empty());
        assert_eq!(state.finished, ["0"]);
    }

    #[test]
    fn custom_prefix_is_used_for_every_tree() {
        let mut config = AgencyConfig::default();
        config.store.prefix = "cluster-a".into();
        let mut agency = Agency::open(&config).unwrap();
        agency.add_primary("P1").unwrap();
        assert_eq!(
            agency.store().get("/cluster-a/Target/DBServers/P1", false).unwrap(),
            json!("none")
        );
    }

    #[test]
    fn move_shard_reports_unknown_names() {
        let agency = agency();
        let err = agency.move_shard("nope", "c", "s1", "db1").unwrap_err();
        assert!(matches!(err, FacadeError::UnknownDatabase(ref db) if db == "nope"));

        agency
            .store()
            .set("/arango/Target/Collections/_system/1", json!({"name": "c"}), None)
            .unwrap();
        let err = agency.move_shard("_system", "d", "s1", "db1").unwrap_err();
        assert!(matches!(err, FacadeError::UnknownCollection { .. }));
    }
}
