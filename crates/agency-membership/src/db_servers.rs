//! DBServers view — primary/secondary pairings.

use std::collections::BTreeMap;

use agency_core::{DEFAULT_CAS_ATTEMPTS, ServerId, ServerRecord, UNPAIRED};
use agency_routes::{Bind, ReadOnlyRoute, ReadRoute, Route, VersionedCache, WriteRoute};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::error::{MembershipError, MembershipResult};

/// What `remove_server` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The server was a primary and its key is gone. Its former secondary,
    /// if any, is now an unpaired primary.
    RemovedPrimary { demoted: Option<ServerId> },
    /// The server was a secondary and `primary` is now unpaired.
    DetachedSecondary { primary: ServerId },
    /// Not a DBServer in this map.
    NotFound,
}

/// One read of the pairing map.
#[derive(Debug)]
struct Pairings {
    raw: Map<String, Value>,
    servers: BTreeMap<ServerId, ServerRecord>,
}

/// Cached view over a `<scope>/DBServers` route.
///
/// `R` decides what the view can do: any readable route gives `get_list`,
/// a [`WriteRoute`] (Target) adds the mutations.
pub struct DbServersView<R> {
    route: R,
    registry: Option<ReadOnlyRoute>,
    cache: VersionedCache<Pairings>,
    addresses: VersionedCache<BTreeMap<ServerId, String>>,
    cas_attempts: u32,
}

impl<R: ReadRoute + Bind> DbServersView<R> {
    pub fn new(route: R) -> Self {
        Self {
            route,
            registry: None,
            cache: VersionedCache::new(true),
            addresses: VersionedCache::new(true),
            cas_attempts: DEFAULT_CAS_ATTEMPTS,
        }
    }

    /// Join resolved endpoints from a `ServersRegistered` route.
    pub fn with_registry(mut self, registry: ReadOnlyRoute) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Disable version gating so every read refetches.
    pub fn with_version_gating(mut self, gated: bool) -> Self {
        self.cache = VersionedCache::new(gated);
        self.addresses = VersionedCache::new(gated);
        self
    }

    pub fn with_cas_attempts(mut self, attempts: u32) -> Self {
        self.cas_attempts = attempts.max(1);
        self
    }

    pub fn route(&self) -> &R {
        &self.route
    }

    /// Every server in the map, keyed by id.
    pub fn get_list(&mut self) -> MembershipResult<BTreeMap<ServerId, ServerRecord>> {
        let mut servers = self.pairings()?.servers.clone();
        if let Some(registry) = &self.registry {
            let addresses = self.addresses.get_or_fetch(registry, |route| {
                route.get(true).map(|value| parse_registry(&value))
            })?;
            for (id, record) in servers.iter_mut() {
                record.address = addresses.get(id).cloned();
            }
        }
        Ok(servers)
    }

    /// A single server's record.
    pub fn get(&mut self, id: &str) -> MembershipResult<Option<ServerRecord>> {
        Ok(self.get_list()?.remove(id))
    }

    fn pairings(&mut self) -> MembershipResult<&Pairings> {
        self.cache.get_or_fetch(&self.route, |route| {
            let raw = match route.get(true)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let servers = store_servers_in_cache(&raw);
            Ok::<_, MembershipError>(Pairings { raw, servers })
        })
    }
}

impl<R: WriteRoute + Bind> DbServersView<R> {
    /// Register `id` as an unpaired primary. Overwrites an existing pairing.
    pub fn add_primary(&mut self, id: &str) -> MembershipResult<()> {
        self.route.child(id)?.set(json!(UNPAIRED))?;
        info!(server_id = %id, "primary added");
        Ok(())
    }

    /// Pair `id` as the secondary of the existing primary `primary_id`.
    ///
    /// Fails with [`MembershipError::UnknownPrimary`] unless `primary_id` is a
    /// key of the map. The write is a compare-and-swap on the primary's value.
    pub fn add_secondary(&mut self, id: &str, primary_id: &str) -> MembershipResult<()> {
        let key = self.route.child(primary_id)?;
        for attempt in 1..=self.cas_attempts {
            let current = match self.pairings()?.raw.get(primary_id) {
                Some(value) => value.clone(),
                None => return Err(MembershipError::UnknownPrimary(primary_id.to_string())),
            };
            if let Some(previous) = paired_secondary(&current)
                && previous != id
            {
                warn!(primary_id = %primary_id, %previous, secondary_id = %id, "replacing secondary");
            }
            if key.cas(&current, json!(id))? {
                info!(primary_id = %primary_id, secondary_id = %id, "secondary added");
                return Ok(());
            }
            debug!(primary_id = %primary_id, attempt, "pairing changed underneath, retrying");
            self.cache.invalidate();
        }
        Err(MembershipError::Contended {
            path: key.path().to_string(),
            attempts: self.cas_attempts,
        })
    }

    /// Write the pairing `primary_id -> secondary_id`, creating the primary
    /// if needed.
    pub fn add_pair(&mut self, primary_id: &str, secondary_id: &str) -> MembershipResult<()> {
        self.route.child(primary_id)?.set(json!(secondary_id))?;
        info!(%primary_id, %secondary_id, "pair added");
        Ok(())
    }

    /// Remove `id` from the pairing map.
    ///
    /// A primary loses its key and its secondary is demoted to an unpaired
    /// primary. A secondary is detached from its primary.
    pub fn remove_server(&mut self, id: &str) -> MembershipResult<RemoveOutcome> {
        for attempt in 1..=self.cas_attempts {
            let (primary_entry, owner) = {
                let pairings = self.pairings()?;
                let primary_entry = pairings.raw.get(id).map(|value| {
                    paired_secondary(value)
                        .filter(|secondary| !pairings.raw.contains_key(*secondary))
                        .map(str::to_string)
                });
                let owner = pairings
                    .raw
                    .iter()
                    .find(|(_, value)| paired_secondary(value) == Some(id))
                    .map(|(primary, value)| (primary.clone(), value.clone()));
                (primary_entry, owner)
            };

            if let Some(demoted) = primary_entry {
                self.route.child(id)?.remove(false)?;
                if let Some(secondary) = &demoted {
                    self.route.child(secondary)?.set(json!(UNPAIRED))?;
                }
                info!(server_id = %id, ?demoted, "primary removed");
                return Ok(RemoveOutcome::RemovedPrimary { demoted });
            }

            let Some((primary, current)) = owner else {
                debug!(server_id = %id, "not a DBServer");
                return Ok(RemoveOutcome::NotFound);
            };
            if self.route.child(&primary)?.cas(&current, json!(UNPAIRED))? {
                info!(server_id = %id, %primary, "secondary detached");
                return Ok(RemoveOutcome::DetachedSecondary { primary });
            }
            debug!(server_id = %id, attempt, "pairing changed underneath, retrying");
            self.cache.invalidate();
        }
        Err(MembershipError::Contended {
            path: self.route.path().to_string(),
            attempts: self.cas_attempts,
        })
    }
}

/// The secondary id a pairing value names, if any.
fn paired_secondary(value: &Value) -> Option<&str> {
    value
        .as_str()
        .filter(|secondary| *secondary != UNPAIRED && !secondary.is_empty())
}

/// Interpret a raw pairing map: every key is a primary, every paired value a
/// secondary. A server that is itself a key stays a primary.
fn store_servers_in_cache(raw: &Map<String, Value>) -> BTreeMap<ServerId, ServerRecord> {
    let mut servers: BTreeMap<ServerId, ServerRecord> = raw
        .iter()
        .map(|(id, value)| {
            let mut record = ServerRecord::primary(id.as_str());
            record.secondary_id = paired_secondary(value).map(str::to_string);
            (id.clone(), record)
        })
        .collect();
    for value in raw.values() {
        if let Some(secondary) = paired_secondary(value) {
            servers
                .entry(secondary.to_string())
                .or_insert_with(|| ServerRecord::secondary(secondary));
        }
    }
    servers
}

/// `ServersRegistered/<id>` is `{ "endpoint": ... }` or a bare endpoint string.
fn parse_registry(value: &Value) -> BTreeMap<ServerId, String> {
    let Some(entries) = value.as_object() else {
        return BTreeMap::new();
    };
    entries
        .iter()
        .filter_map(|(id, entry)| {
            let endpoint = match entry {
                Value::String(endpoint) => endpoint.as_str(),
                Value::Object(fields) => fields.get("endpoint")?.as_str()?,
                _ => return None,
            };
            Some((id.clone(), endpoint.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agency_core::Role;
    use agency_routes::{ReadWriteRoute, RouteBuilder};
    use agency_store::{AgencyStore, SharedStore, StoreClient};

    fn setup() -> (SharedStore, DbServersView<ReadWriteRoute>) {
        let store = AgencyStore::open_in_memory().unwrap().shared();
        let routes = RouteBuilder::new(store.clone()).build().unwrap();
        (store, DbServersView::new(routes.target.db_servers))
    }

    #[test]
    fn add_primary_is_unpaired() {
        let (_, mut view) = setup();
        view.add_primary("A").unwrap();
        let list = view.get_list().unwrap();
        assert_eq!(list["A"].role, Role::Primary);
        assert_eq!(list["A"].secondary_id, None);
    }

    #[test]
    fn add_primary_overwrites_existing_pairing() {
        let (store, mut view) = setup();
        view.add_pair("A", "B").unwrap();
        view.add_primary("A").unwrap();

        assert_eq!(store.get("/arango/Target/DBServers/A", false).unwrap(), json!("none"));
        let list = view.get_list().unwrap();
        assert!(list["A"].is_unpaired());
        assert!(!list.contains_key("B"));
    }

    #[test]
    fn add_secondary_pairs_existing_primary() {
        let (store, mut view) = setup();
        view.add_primary("A").unwrap();
        view.add_secondary("B", "A").unwrap();

        let list = view.get_list().unwrap();
        assert_eq!(list["A"].secondary_id.as_deref(), Some("B"));
        assert_eq!(list["B"].role, Role::Secondary);
        assert_eq!(list["B"].secondary_id, None);
        assert_eq!(store.get("/arango/Target/DBServers/A", false).unwrap(), json!("B"));
    }

    #[test]
    fn add_secondary_rejects_unknown_primary() {
        let (store, mut view) = setup();
        let err = view.add_secondary("B", "ghost").unwrap_err();
        assert!(matches!(err, MembershipError::UnknownPrimary(ref id) if id == "ghost"));
        assert_eq!(store.get("/arango/Target/DBServers", true).unwrap(), json!({}));
    }

    #[test]
    fn add_pair_creates_primary_on_write() {
        let (_, mut view) = setup();
        view.add_pair("P", "S").unwrap();
        let list = view.get_list().unwrap();
        assert_eq!(list["P"].secondary_id.as_deref(), Some("S"));
        assert_eq!(list["S"].role, Role::Secondary);
    }

    #[test]
    fn remove_primary_demotes_secondary() {
        let (store, mut view) = setup();
        view.add_pair("A", "B").unwrap();

        let outcome = view.remove_server("A").unwrap();
        assert_eq!(
            outcome,
            RemoveOutcome::RemovedPrimary {
                demoted: Some("B".into())
            }
        );
        assert_eq!(
            store.get("/arango/Target/DBServers", true).unwrap(),
            json!({"B": "none"})
        );
        let list = view.get_list().unwrap();
        assert_eq!(list.len(), 1);
        assert!(list["B"].is_unpaired());
    }

    #[test]
    fn remove_secondary_detaches_from_primary() {
        let (_, mut view) = setup();
        view.add_pair("A", "B").unwrap();

        let outcome = view.remove_server("B").unwrap();
        assert_eq!(
            outcome,
            RemoveOutcome::DetachedSecondary {
                primary: "A".into()
            }
        );
        let list = view.get_list().unwrap();
        assert_eq!(list["A"].secondary_id, None);
        assert!(!list.contains_key("B"));
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let (_, mut view) = setup();
        view.add_primary("A").unwrap();
        assert_eq!(view.remove_server("Z").unwrap(), RemoveOutcome::NotFound);
    }

    #[test]
    fn key_wins_over_value() {
        let raw = json!({"A": "B", "B": "none", "C": 42});
        let servers = store_servers_in_cache(raw.as_object().unwrap());
        assert_eq!(servers["B"].role, Role::Primary);
        assert_eq!(servers["A"].secondary_id.as_deref(), Some("B"));
        assert!(servers["C"].is_unpaired());
    }

    #[test]
    fn removing_primary_does_not_clobber_a_primary_secondary() {
        let (store, mut view) = setup();
        view.add_pair("A", "B").unwrap();
        view.add_pair("B", "C").unwrap();

        let outcome = view.remove_server("A").unwrap();
        assert_eq!(outcome, RemoveOutcome::RemovedPrimary { demoted: None });
        assert_eq!(
            store.get("/arango/Target/DBServers", true).unwrap(),
            json!({"B": "C"})
        );
    }

    #[test]
    fn writes_from_another_client_are_visible() {
        let (store, mut view) = setup();
        view.add_primary("A").unwrap();
        assert_eq!(view.get_list().unwrap().len(), 1);

        store
            .set("/arango/Target/DBServers/X", json!("none"), None)
            .unwrap();
        assert!(view.get_list().unwrap().contains_key("X"));
    }

    #[test]
    fn registry_addresses_are_joined() {
        let store = AgencyStore::open_in_memory().unwrap().shared();
        let routes = RouteBuilder::new(store.clone()).build().unwrap();
        store.set("/arango/Current/DBServers/A", json!("B"), None).unwrap();
        store
            .set(
                "/arango/Current/ServersRegistered/A",
                json!({"endpoint": "tcp://10.0.0.1:8529"}),
                None,
            )
            .unwrap();
        store
            .set("/arango/Current/ServersRegistered/B", json!("tcp://10.0.0.2:8529"), None)
            .unwrap();

        let mut view = DbServersView::new(routes.current.db_servers)
            .with_registry(routes.current.servers_registered);
        let list = view.get_list().unwrap();
        assert_eq!(list["A"].address.as_deref(), Some("tcp://10.0.0.1:8529"));
        assert_eq!(list["B"].address.as_deref(), Some("tcp://10.0.0.2:8529"));
    }
}
