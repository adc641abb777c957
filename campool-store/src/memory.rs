use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use campool_core::models::{Destination, Match, MatchStatus, RideOffer, RideStatus};
use campool_core::repository::{RideshareStore, StoreCounts, StoreTx};
use campool_core::StoreError;

use crate::codec;

/// In-memory store backing tests and single-node deployments.
///
/// A single mutex serializes transactions, so each transaction reads a
/// stable state and its writes land atomically. Plain queries take the
/// lock only for the duration of the lookup.
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    rides: HashMap<Uuid, RideRow>,
    matches: HashMap<Uuid, MatchRow>,
}

// Internal row structs mirroring what a relational schema would hold;
// statuses travel as strings and go through the codec at the boundary.
#[derive(Debug, Clone)]
struct RideRow {
    id: Uuid,
    owner_id: Uuid,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    flexible: bool,
    flexibility_minutes: i32,
    max_passengers: i32,
    cost_split: String,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct MatchRow {
    id: Uuid,
    ride_a: Uuid,
    ride_b: Uuid,
    score: f64,
    status: String,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl RideRow {
    fn from_model(ride: &RideOffer) -> Self {
        Self {
            id: ride.id,
            owner_id: ride.owner_id,
            origin: ride.origin.clone(),
            destination: codec::destination_to_db(ride.destination).to_string(),
            departure_at: ride.departure_at,
            flexible: ride.flexible,
            flexibility_minutes: ride.flexibility_minutes,
            max_passengers: ride.max_passengers,
            cost_split: codec::cost_split_to_db(ride.cost_split).to_string(),
            notes: ride.notes.clone(),
            status: codec::ride_status_to_db(ride.status).to_string(),
            created_at: ride.created_at,
            updated_at: ride.updated_at,
        }
    }

    fn into_model(self) -> Result<RideOffer, StoreError> {
        Ok(RideOffer {
            id: self.id,
            owner_id: self.owner_id,
            origin: self.origin,
            destination: codec::destination_from_db(&self.destination)?,
            departure_at: self.departure_at,
            flexible: self.flexible,
            flexibility_minutes: self.flexibility_minutes,
            max_passengers: self.max_passengers,
            cost_split: codec::cost_split_from_db(&self.cost_split)?,
            notes: self.notes,
            status: codec::ride_status_from_db(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl MatchRow {
    fn from_model(record: &Match) -> Self {
        Self {
            id: record.id,
            ride_a: record.ride_a,
            ride_b: record.ride_b,
            score: record.score,
            status: codec::match_status_to_db(record.status).to_string(),
            created_at: record.created_at,
            confirmed_at: record.confirmed_at,
            completed_at: record.completed_at,
        }
    }

    fn into_model(self) -> Result<Match, StoreError> {
        Ok(Match {
            id: self.id,
            ride_a: self.ride_a,
            ride_b: self.ride_b,
            score: self.score,
            status: codec::match_status_from_db(&self.status)?,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
            completed_at: self.completed_at,
        })
    }

    fn is_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.ride_a == a && self.ride_b == b) || (self.ride_a == b && self.ride_b == a)
    }

    fn links(&self, ride_id: Uuid) -> bool {
        self.ride_a == ride_id || self.ride_b == ride_id
    }
}

impl Tables {
    fn ride(&self, id: Uuid) -> Result<Option<RideOffer>, StoreError> {
        self.rides
            .get(&id)
            .cloned()
            .map(RideRow::into_model)
            .transpose()
    }

    fn match_record(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
        self.matches
            .get(&id)
            .cloned()
            .map(MatchRow::into_model)
            .transpose()
    }

    fn live_match_for_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Match>, StoreError> {
        for row in self.matches.values() {
            if !row.is_pair(a, b) {
                continue;
            }
            let record = row.clone().into_model()?;
            if record.is_live() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn matches_for_ride(&self, ride_id: Uuid) -> Result<Vec<Match>, StoreError> {
        let mut rows: Vec<MatchRow> = self
            .matches
            .values()
            .filter(|row| row.links(ride_id))
            .cloned()
            .collect();
        rows.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        rows.into_iter().map(MatchRow::into_model).collect()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RideshareStore for MemoryStore {
    async fn ride(&self, id: Uuid) -> Result<Option<RideOffer>, StoreError> {
        self.tables.lock().await.ride(id)
    }

    async fn match_record(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
        self.tables.lock().await.match_record(id)
    }

    async fn rides_by_destination(
        &self,
        destination: Destination,
    ) -> Result<Vec<RideOffer>, StoreError> {
        let key = codec::destination_to_db(destination);
        let mut rows: Vec<RideRow> = {
            let tables = self.tables.lock().await;
            tables
                .rides
                .values()
                .filter(|row| row.destination == key)
                .cloned()
                .collect()
        };
        rows.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        rows.into_iter().map(RideRow::into_model).collect()
    }

    async fn rides_by_user(&self, user_id: Uuid) -> Result<Vec<RideOffer>, StoreError> {
        let mut rows: Vec<RideRow> = {
            let tables = self.tables.lock().await;
            tables
                .rides
                .values()
                .filter(|row| row.owner_id == user_id)
                .cloned()
                .collect()
        };
        rows.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        rows.into_iter().map(RideRow::into_model).collect()
    }

    async fn rides_by_status(&self, status: RideStatus) -> Result<Vec<RideOffer>, StoreError> {
        let key = codec::ride_status_to_db(status);
        let mut rows: Vec<RideRow> = {
            let tables = self.tables.lock().await;
            tables
                .rides
                .values()
                .filter(|row| row.status == key)
                .cloned()
                .collect()
        };
        rows.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        rows.into_iter().map(RideRow::into_model).collect()
    }

    async fn matches_for_ride(&self, ride_id: Uuid) -> Result<Vec<Match>, StoreError> {
        self.tables.lock().await.matches_for_ride(ride_id)
    }

    async fn matches_for_user(&self, user_id: Uuid) -> Result<Vec<Match>, StoreError> {
        let tables = self.tables.lock().await;
        let owned_rides: HashSet<Uuid> = tables
            .rides
            .values()
            .filter(|row| row.owner_id == user_id)
            .map(|row| row.id)
            .collect();
        let mut rows: Vec<MatchRow> = tables
            .matches
            .values()
            .filter(|row| owned_rides.contains(&row.ride_a) || owned_rides.contains(&row.ride_b))
            .cloned()
            .collect();
        drop(tables);
        rows.sort_by(|x, y| y.created_at.cmp(&x.created_at));
        rows.into_iter().map(MatchRow::into_model).collect()
    }

    async fn live_match_for_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Match>, StoreError> {
        self.tables.lock().await.live_match_for_pair(a, b)
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let tables = self.tables.lock().await;
        let accepted = codec::match_status_to_db(MatchStatus::Accepted);
        let mut rides_by_destination: Vec<(Destination, u64)> = Destination::ALL
            .iter()
            .map(|destination| {
                let key = codec::destination_to_db(*destination);
                let count = tables
                    .rides
                    .values()
                    .filter(|row| row.destination == key)
                    .count() as u64;
                (*destination, count)
            })
            .collect();
        rides_by_destination.sort_by(|x, y| y.1.cmp(&x.1));
        Ok(StoreCounts {
            total_rides: tables.rides.len() as u64,
            total_matches: tables.matches.len() as u64,
            accepted_matches: tables
                .matches
                .values()
                .filter(|row| row.status == accepted)
                .count() as u64,
            rides_by_destination,
        })
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let snapshot = guard.clone();
        debug!("Transaction opened");
        Ok(Box::new(MemoryTx {
            guard,
            snapshot,
            committed: false,
        }))
    }
}

/// Transaction over [`MemoryStore`]. Holds the table lock for its whole
/// lifetime; the pre-transaction snapshot is restored when it is dropped
/// without a commit.
struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Tables,
    committed: bool,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn ride(&mut self, id: Uuid) -> Result<Option<RideOffer>, StoreError> {
        self.guard.ride(id)
    }

    async fn save_ride(&mut self, ride: &RideOffer) -> Result<(), StoreError> {
        let row = RideRow::from_model(ride);
        self.guard.rides.insert(row.id, row);
        Ok(())
    }

    async fn match_record(&mut self, id: Uuid) -> Result<Option<Match>, StoreError> {
        self.guard.match_record(id)
    }

    async fn save_match(&mut self, record: &Match) -> Result<(), StoreError> {
        let row = MatchRow::from_model(record);
        self.guard.matches.insert(row.id, row);
        Ok(())
    }

    async fn delete_match(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.guard.matches.remove(&id);
        Ok(())
    }

    async fn live_match_for_pair(
        &mut self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Match>, StoreError> {
        self.guard.live_match_for_pair(a, b)
    }

    async fn matches_for_ride(&mut self, ride_id: Uuid) -> Result<Vec<Match>, StoreError> {
        self.guard.matches_for_ride(ride_id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        tx.committed = true;
        debug!("Transaction committed");
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.committed {
            debug!("Uncommitted transaction dropped, restoring snapshot");
            *self.guard = std::mem::take(&mut self.snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campool_core::models::CostSplit;
    use chrono::{Duration, TimeZone};

    fn sample_ride(owner_id: Uuid, destination: Destination, minute: u32) -> RideOffer {
        let created = Utc.with_ymd_and_hms(2026, 6, 1, 9, minute, 0).unwrap();
        RideOffer {
            id: Uuid::new_v4(),
            owner_id,
            origin: "Parking Structure A".to_string(),
            destination,
            departure_at: created + Duration::days(3),
            flexible: false,
            flexibility_minutes: 0,
            max_passengers: 2,
            cost_split: CostSplit::Equal,
            notes: Some("two bags".to_string()),
            status: RideStatus::Active,
            created_at: created,
            updated_at: created,
        }
    }

    async fn put_ride(store: &MemoryStore, ride: &RideOffer) {
        let mut tx = store.begin().await.unwrap();
        tx.save_ride(ride).await.unwrap();
        tx.commit().await.unwrap();
    }

    async fn put_match(store: &MemoryStore, record: &Match) {
        let mut tx = store.begin().await.unwrap();
        tx.save_match(record).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_ride_round_trip() {
        let store = MemoryStore::new();
        let ride = sample_ride(Uuid::new_v4(), Destination::Lax, 0);
        put_ride(&store, &ride).await;

        let loaded = store.ride(ride.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, ride.id);
        assert_eq!(loaded.destination, Destination::Lax);
        assert_eq!(loaded.status, RideStatus::Active);
        assert_eq!(loaded.cost_split, CostSplit::Equal);
        assert_eq!(loaded.notes.as_deref(), Some("two bags"));
        assert_eq!(loaded.departure_at, ride.departure_at);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let ride = sample_ride(Uuid::new_v4(), Destination::Bur, 0);

        {
            let mut tx = store.begin().await.unwrap();
            tx.save_ride(&ride).await.unwrap();
            // No commit; the guard drops here
        }

        assert!(store.ride(ride.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollback_restores_committed_state() {
        let store = MemoryStore::new();
        let mut ride = sample_ride(Uuid::new_v4(), Destination::Ont, 0);
        put_ride(&store, &ride).await;

        {
            let mut tx = store.begin().await.unwrap();
            ride.set_status(RideStatus::Cancelled, Utc::now());
            tx.save_ride(&ride).await.unwrap();
        }

        let loaded = store.ride(ride.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RideStatus::Active);
    }

    #[tokio::test]
    async fn test_concurrent_transactions_serialize() {
        let store = Arc::new(MemoryStore::new());
        let mut ride = sample_ride(Uuid::new_v4(), Destination::Lax, 0);
        ride.max_passengers = 1;
        put_ride(&store, &ride).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = Arc::clone(&store);
            let ride_id = ride.id;
            handles.push(tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                let mut ride = tx.ride(ride_id).await.unwrap().unwrap();
                ride.max_passengers += 1;
                tx.save_ride(&ride).await.unwrap();
                tx.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Serialized transactions never lose an update
        let loaded = store.ride(ride.id).await.unwrap().unwrap();
        assert_eq!(loaded.max_passengers, 3);
    }

    #[tokio::test]
    async fn test_live_pair_lookup() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut rejected = Match::suggested(a, b, 0.7, now);
        rejected.status = MatchStatus::Rejected;
        put_match(&store, &rejected).await;

        assert!(store.live_match_for_pair(a, b).await.unwrap().is_none());

        let suggested = Match::suggested(b, a, 0.9, now);
        put_match(&store, &suggested).await;

        let found = store.live_match_for_pair(a, b).await.unwrap().unwrap();
        assert_eq!(found.id, suggested.id);
        // Pair lookup is unordered
        let found = store.live_match_for_pair(b, a).await.unwrap().unwrap();
        assert_eq!(found.id, suggested.id);
    }

    #[tokio::test]
    async fn test_matches_for_user() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();

        let ride_a = sample_ride(alice, Destination::Lax, 0);
        let ride_b = sample_ride(bob, Destination::Lax, 1);
        let ride_c = sample_ride(carol, Destination::Lax, 2);
        for ride in [&ride_a, &ride_b, &ride_c] {
            put_ride(&store, ride).await;
        }

        put_match(&store, &Match::accepted(ride_a.id, ride_b.id, 0.9, now)).await;
        put_match(&store, &Match::suggested(ride_b.id, ride_c.id, 0.8, now)).await;

        assert_eq!(store.matches_for_user(alice).await.unwrap().len(), 1);
        assert_eq!(store.matches_for_user(bob).await.unwrap().len(), 2);
        assert_eq!(store.matches_for_user(carol).await.unwrap().len(), 1);
        assert!(store
            .matches_for_user(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_counts() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let ride_a = sample_ride(Uuid::new_v4(), Destination::Lax, 0);
        let ride_b = sample_ride(Uuid::new_v4(), Destination::Lax, 1);
        let ride_c = sample_ride(Uuid::new_v4(), Destination::Bur, 2);
        for ride in [&ride_a, &ride_b, &ride_c] {
            put_ride(&store, ride).await;
        }
        put_match(&store, &Match::accepted(ride_a.id, ride_b.id, 1.0, now)).await;
        put_match(&store, &Match::suggested(ride_a.id, ride_c.id, 0.5, now)).await;

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.total_rides, 3);
        assert_eq!(counts.total_matches, 2);
        assert_eq!(counts.accepted_matches, 1);
        assert_eq!(counts.rides_by_destination[0], (Destination::Lax, 2));
        assert_eq!(counts.rides_by_destination[1], (Destination::Bur, 1));
    }

    #[tokio::test]
    async fn test_rides_by_status_ordering() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let older = sample_ride(owner, Destination::Lax, 0);
        let newer = sample_ride(owner, Destination::Bur, 30);
        put_ride(&store, &older).await;
        put_ride(&store, &newer).await;

        let active = store.rides_by_status(RideStatus::Active).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, newer.id);
        assert_eq!(active[1].id, older.id);
    }
}
