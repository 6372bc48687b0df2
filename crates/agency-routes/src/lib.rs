//! agency-routes — bound paths into the agency store.
//!
//! A route is a path plus a fixed capability set. The capability set is the
//! route's type:
//!
//! | type             | list | get / version | set / remove / cas |
//! |------------------|------|---------------|--------------------|
//! | [`ListOnlyRoute`]  | yes  |               |                    |
//! | [`ReadOnlyRoute`]  | yes  | yes           |                    |
//! | [`ReadWriteRoute`] | yes  | yes           | yes                |
//!
//! Child routes are bound with [`add_level`], which only permits the same or
//! a narrower capability set than the parent, so a Plan route can never be
//! turned into a writable one. [`RouteBuilder`] binds the whole known tree
//! once, and [`VersionedCache`] gives views a snapshot that is refetched
//! only when the store's revision for the route's subtree has advanced.

pub mod builder;
pub mod cache;
pub mod error;
pub mod route;

pub use builder::{
    AgencyRoutes, CollectionRoutes, CurrentRoutes, DEFAULT_PREFIX, PlanRoutes, RouteBuilder,
    SyncRoutes, TargetRoutes, add_levels_for_dbs,
};
pub use cache::VersionedCache;
pub use error::{RouteError, RouteResult};
pub use route::{
    Bind, Grants, ListOnlyRoute, ListRoute, ReadOnlyRoute, ReadRoute, ReadWriteRoute, Route,
    WriteRoute, add_level,
};
