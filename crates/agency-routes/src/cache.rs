//! Version-gated snapshot cache owned by a single view.

use tracing::trace;

use crate::error::RouteError;
use crate::route::{ReadRoute, Route};

#[derive(Debug)]
struct CacheEntry<T> {
    version: u64,
    value: T,
}

/// Last snapshot a view took of its route, with the store revision it was
/// taken at.
///
/// The revision is read before the fetch, so a write racing the fetch can
/// only cause one extra refetch, never a stale hit.
#[derive(Debug)]
pub struct VersionedCache<T> {
    gated: bool,
    entry: Option<CacheEntry<T>>,
}

impl<T> Default for VersionedCache<T> {
    fn default() -> Self {
        Self::new(true)
    }
}

impl<T> VersionedCache<T> {
    /// With `gated = false` every access refetches.
    pub fn new(gated: bool) -> Self {
        Self { gated, entry: None }
    }

    /// Whether the cached snapshot is still current for `route`.
    pub fn check_version<R: ReadRoute>(&self, route: &R) -> Result<bool, RouteError> {
        match &self.entry {
            Some(entry) if self.gated => route.check_version(entry.version),
            _ => Ok(false),
        }
    }

    /// Cached snapshot, refetched with `fetch` when stale.
    pub fn get_or_fetch<R, E>(
        &mut self,
        route: &R,
        fetch: impl FnOnce(&R) -> Result<T, E>,
    ) -> Result<&T, E>
    where
        R: ReadRoute,
        E: From<RouteError>,
    {
        let version = route.version()?;
        let entry = match self.entry.take() {
            Some(entry) if self.gated && entry.version == version => entry,
            _ => {
                trace!(path = %route.path(), version, "view cache refetch");
                CacheEntry {
                    version,
                    value: fetch(route)?,
                }
            }
        };
        Ok(&self.entry.insert(entry).value)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Bind, ReadWriteRoute, WriteRoute};
    use agency_store::{AgencyStore, StoreError};
    use serde_json::{Value, json};

    fn route() -> ReadWriteRoute {
        let store = AgencyStore::open_in_memory().unwrap().shared();
        ReadWriteRoute::root(store, "arango/Target/DBServers").unwrap()
    }

    #[test]
    fn refetches_only_after_subtree_changes() {
        let route = route();
        route.child("P1").unwrap().set(json!("none")).unwrap();
        let mut cache = VersionedCache::<Value>::new(true);
        let mut fetches = 0;

        for _ in 0..3 {
            cache
                .get_or_fetch(&route, |r| {
                    fetches += 1;
                    r.get(true)
                })
                .unwrap();
        }
        assert_eq!(fetches, 1);
        assert!(cache.check_version(&route).unwrap());

        route.child("P2").unwrap().set(json!("none")).unwrap();
        assert!(!cache.check_version(&route).unwrap());
        let snapshot = cache
            .get_or_fetch(&route, |r| {
                fetches += 1;
                r.get(true)
            })
            .unwrap();
        assert_eq!(snapshot, &json!({"P1": "none", "P2": "none"}));
        assert_eq!(fetches, 2);
    }

    #[test]
    fn ungated_cache_always_refetches() {
        let route = route();
        let mut cache = VersionedCache::<Value>::new(false);
        let mut fetches = 0;
        for _ in 0..3 {
            cache
                .get_or_fetch(&route, |r| {
                    fetches += 1;
                    r.get(true)
                })
                .unwrap();
        }
        assert_eq!(fetches, 3);
        assert!(!cache.check_version(&route).unwrap());
    }

    #[test]
    fn failed_fetch_leaves_cache_empty() {
        let route = route();
        let mut cache = VersionedCache::<Value>::new(true);
        let result = cache.get_or_fetch(&route, |_| {
            Err::<Value, _>(RouteError::Store(StoreError::InvalidPath("/x".into())))
        });
        assert!(result.is_err());
        assert!(!cache.check_version(&route).unwrap());

        cache.get_or_fetch(&route, |r| r.get(true)).unwrap();
        assert!(cache.check_version(&route).unwrap());
        cache.invalidate();
        assert!(!cache.check_version(&route).unwrap());
    }
}
