//! Error types for topology views.

use agency_routes::RouteError;
use thiserror::Error;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("collection not found: {database}/{collection}")]
    CollectionNotFound { database: String, collection: String },

    #[error("invalid collection document at {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("shard {shard} not found in collection {collection}")]
    ShardNotFound { collection: String, shard: String },

    #[error("collection {collection} follows {prototype}; move the prototype's shards instead")]
    FollowsPrototype { collection: String, prototype: String },

    #[error("{path}: document kept changing, gave up after {attempts} compare-and-swap attempts")]
    Contended { path: String, attempts: u32 },
}
