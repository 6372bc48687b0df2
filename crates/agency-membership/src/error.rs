//! Error types for membership views.

use agency_routes::RouteError;
use agency_store::StoreError;
use thiserror::Error;

/// Result type alias for membership operations.
pub type MembershipResult<T> = Result<T, MembershipError>;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("unknown primary: {0}")]
    UnknownPrimary(String),

    #[error("{path}: value kept changing, gave up after {attempts} compare-and-swap attempts")]
    Contended { path: String, attempts: u32 },
}

impl From<StoreError> for MembershipError {
    fn from(err: StoreError) -> Self {
        MembershipError::Route(RouteError::Store(err))
    }
}
