//! agency-store — the coordination store boundary.
//!
//! [`StoreClient`] is the narrow contract every route talks through:
//! get / set / remove / list / createDirectory / cas, plus a per-subtree
//! `version` used for cache freshness checks.
//!
//! [`AgencyStore`] is an embedded implementation backed by
//! [redb](https://docs.rs/redb), with persistent and in-memory backends.
//!
//! # Architecture
//!
//! Every node of the tree is one row in the `nodes` table keyed by its
//! normalised path (`/arango/Target/DBServers/P1`). Each row records whether
//! the node is a directory or a leaf, the leaf's JSON value, and the store
//! revision at which the subtree rooted there last changed. A write bumps the
//! global revision and stamps it on the written path and all its ancestors,
//! which makes `version(path)` a cheap single-row read. Keys with a TTL are
//! indexed in the `expiry` table and purged lazily before each operation.

pub mod client;
pub mod error;
pub mod path;
pub mod store;
pub mod tables;

pub use client::{CasOptions, SharedStore, StoreClient};
pub use error::{StoreError, StoreResult};
pub use store::AgencyStore;
