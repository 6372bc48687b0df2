//! Error types for the heartbeat monitor.

use agency_routes::RouteError;
use thiserror::Error;

/// Result type alias for health operations.
pub type HealthResult<T> = Result<T, HealthError>;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error(transparent)]
    Route(#[from] RouteError),
}
