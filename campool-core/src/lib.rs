pub mod models;
pub mod repository;

pub use models::{CostSplit, Destination, Match, MatchStatus, RideOffer, RideStatus};
pub use repository::{RideshareStore, StoreCounts, StoreTx};

/// Boxed error surfaced by store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Store(err)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
