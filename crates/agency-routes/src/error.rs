//! Error types for route operations.

use agency_store::StoreError;
use thiserror::Error;

/// Result type alias for route operations.
pub type RouteResult<T> = Result<T, RouteError>;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
