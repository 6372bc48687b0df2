//! Error types for the facade.

use agency_health::HealthError;
use agency_membership::MembershipError;
use agency_routes::RouteError;
use agency_store::StoreError;
use agency_topology::TopologyError;
use thiserror::Error;

/// Result type alias for facade operations.
pub type FacadeResult<T> = Result<T, FacadeError>;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    #[error("unknown collection: {database}/{collection}")]
    UnknownCollection { database: String, collection: String },
}
