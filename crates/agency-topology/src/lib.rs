//! agency-topology — databases, collections and their shards.
//!
//! Collection plans live at `<scope>/Collections/<database>/<collection id>`
//! as JSON documents; a collection's name is only known from its body.
//!
//! # Components
//!
//! - **`databases`** — `DatabasesView` and the cached per-database catalog
//! - **`collection`** — shard queries and `move_shard` on one collection
//! - **`colocation`** — `distributeShardsLike` layout checks

pub mod collection;
pub mod colocation;
pub mod databases;
pub mod error;

pub use collection::{CollectionView, ShardMove};
pub use colocation::{ColocationViolation, check_colocation};
pub use databases::{DatabaseView, DatabasesView, ShardDistribution};
pub use error::{TopologyError, TopologyResult};
