//! Route types and the capability traits they implement.

use std::fmt;

use agency_store::path;
use agency_store::{CasOptions, SharedStore};
use serde_json::Value;
use tracing::trace;

use crate::error::RouteResult;

mod sealed {
    use agency_store::SharedStore;

    /// Constructs a route at an already-validated path.
    pub trait Construct {
        fn construct(store: SharedStore, path: String) -> Self;
    }
}

/// A bound path into the store.
pub trait Route {
    fn path(&self) -> &str;

    fn store(&self) -> &SharedStore;

    /// The same path with a narrower capability set.
    fn narrow<R>(&self) -> R
    where
        Self: Grants<R> + Sized,
        R: Bind,
    {
        R::construct(self.store().clone(), self.path().to_string())
    }
}

/// Marker: a route of this type may bind child routes of type `R`.
///
/// Every route type grants itself and each narrower type.
pub trait Grants<R> {}

/// Routes that can bind children of their own type.
pub trait Bind: Route + Grants<Self> + sealed::Construct + Sized {
    fn child(&self, segment: &str) -> RouteResult<Self> {
        add_level(self, segment)
    }
}

/// Bind a route of type `R` at `base.path + "/" + segment`.
///
/// `segment` must name exactly one level, so the new route stays inside the
/// subtree `base` was granted.
pub fn add_level<B, R>(base: &B, segment: &str) -> RouteResult<R>
where
    B: Route + Grants<R>,
    R: Bind,
{
    let child = path::join(base.path(), segment)?;
    trace!(path = %child, "route bound");
    Ok(R::construct(base.store().clone(), child))
}

pub trait ListRoute: Route {
    /// Sorted names of the route's immediate children.
    fn list(&self) -> RouteResult<Vec<String>> {
        Ok(self.store().list(self.path())?)
    }
}

pub trait ReadRoute: ListRoute {
    fn get(&self, recursive: bool) -> RouteResult<Value> {
        Ok(self.store().get(self.path(), recursive)?)
    }

    /// Store revision of this route's subtree.
    fn version(&self) -> RouteResult<u64> {
        Ok(self.store().version(self.path())?)
    }

    /// True when nothing under this route changed since `seen`.
    fn check_version(&self, seen: u64) -> RouteResult<bool> {
        Ok(self.version()? == seen)
    }
}

pub trait WriteRoute: ReadRoute {
    fn set(&self, value: Value) -> RouteResult<()> {
        Ok(self.store().set(self.path(), value, None)?)
    }

    fn remove(&self, recursive: bool) -> RouteResult<()> {
        Ok(self.store().remove(self.path(), recursive)?)
    }

    /// Swap `old` for `new`; `Ok(false)` when the stored value differs.
    fn cas(&self, old: &Value, new: Value) -> RouteResult<bool> {
        Ok(self
            .store()
            .cas(self.path(), old, new, CasOptions::default())?)
    }

    fn create_directory(&self) -> RouteResult<()> {
        Ok(self.store().create_directory(self.path())?)
    }
}

macro_rules! route_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            path: String,
            store: SharedStore,
        }

        impl Route for $name {
            fn path(&self) -> &str {
                &self.path
            }

            fn store(&self) -> &SharedStore {
                &self.store
            }
        }

        impl sealed::Construct for $name {
            fn construct(store: SharedStore, path: String) -> Self {
                Self { path, store }
            }
        }

        impl Bind for $name {}

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.path).finish()
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.path == other.path
            }
        }
    };
}

route_type!(
    /// Route that can only enumerate its children.
    ListOnlyRoute
);
route_type!(
    /// Route that can read and version-check its subtree.
    ReadOnlyRoute
);
route_type!(
    /// Route with the full read and write capability set.
    ReadWriteRoute
);

impl ListRoute for ListOnlyRoute {}
impl ListRoute for ReadOnlyRoute {}
impl ListRoute for ReadWriteRoute {}

impl ReadRoute for ReadOnlyRoute {}
impl ReadRoute for ReadWriteRoute {}

impl WriteRoute for ReadWriteRoute {}

impl Grants<ListOnlyRoute> for ListOnlyRoute {}
impl Grants<ListOnlyRoute> for ReadOnlyRoute {}
impl Grants<ReadOnlyRoute> for ReadOnlyRoute {}
impl Grants<ListOnlyRoute> for ReadWriteRoute {}
impl Grants<ReadOnlyRoute> for ReadWriteRoute {}
impl Grants<ReadWriteRoute> for ReadWriteRoute {}

impl ReadWriteRoute {
    /// Root route at `path`, the entry point every other route descends from.
    pub fn root(store: SharedStore, path: &str) -> RouteResult<Self> {
        let path = path::normalize(path)?;
        Ok(Self { path, store })
    }

    pub fn read_only(&self) -> ReadOnlyRoute {
        self.narrow()
    }

    pub fn list_only(&self) -> ListOnlyRoute {
        self.narrow()
    }
}

impl ReadOnlyRoute {
    pub fn list_only(&self) -> ListOnlyRoute {
        self.narrow()
    }
}
