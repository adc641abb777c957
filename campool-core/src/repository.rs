use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Destination, Match, RideOffer, RideStatus};
use crate::StoreError;

/// Aggregate totals for the public stats endpoint
#[derive(Debug, Clone, Default)]
pub struct StoreCounts {
    pub total_rides: u64,
    pub total_matches: u64,
    pub accepted_matches: u64,
    /// Ride counts per destination, busiest first
    pub rides_by_destination: Vec<(Destination, u64)>,
}

/// Read access to rides and matches, plus the transaction entry point.
///
/// Queries outside a transaction may race with concurrent writers and are
/// only used for listing and candidate discovery. Every mutating operation
/// must do all of its precondition reads and writes through one [`StoreTx`].
#[async_trait]
pub trait RideshareStore: Send + Sync {
    async fn ride(&self, id: Uuid) -> Result<Option<RideOffer>, StoreError>;

    async fn match_record(&self, id: Uuid) -> Result<Option<Match>, StoreError>;

    async fn rides_by_destination(
        &self,
        destination: Destination,
    ) -> Result<Vec<RideOffer>, StoreError>;

    async fn rides_by_user(&self, user_id: Uuid) -> Result<Vec<RideOffer>, StoreError>;

    async fn rides_by_status(&self, status: RideStatus) -> Result<Vec<RideOffer>, StoreError>;

    async fn matches_for_ride(&self, ride_id: Uuid) -> Result<Vec<Match>, StoreError>;

    /// Matches where the user owns either side of the pair
    async fn matches_for_user(&self, user_id: Uuid) -> Result<Vec<Match>, StoreError>;

    /// The SUGGESTED or ACCEPTED match for an unordered ride pair, if any
    async fn live_match_for_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Match>, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;

    /// Open a transaction. Reads made through it see a stable snapshot and
    /// its writes become visible only on commit.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// A unit of work over the store. Dropping an uncommitted transaction
/// discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    async fn ride(&mut self, id: Uuid) -> Result<Option<RideOffer>, StoreError>;

    async fn save_ride(&mut self, ride: &RideOffer) -> Result<(), StoreError>;

    async fn match_record(&mut self, id: Uuid) -> Result<Option<Match>, StoreError>;

    async fn save_match(&mut self, record: &Match) -> Result<(), StoreError>;

    async fn delete_match(&mut self, id: Uuid) -> Result<(), StoreError>;

    async fn live_match_for_pair(&mut self, a: Uuid, b: Uuid)
        -> Result<Option<Match>, StoreError>;

    async fn matches_for_ride(&mut self, ride_id: Uuid) -> Result<Vec<Match>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
