use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{error, info, warn};
use uuid::Uuid;

use campool_core::models::RideStatus;
use campool_core::repository::RideshareStore;
use campool_core::CoreResult;

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub examined: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Retires ACTIVE rides whose departure window has fully elapsed.
///
/// Each ride is its own transaction, so one bad ride never blocks the
/// rest of the sweep, and a ride that got matched or cancelled after the
/// listing is left alone.
pub struct ExpirationSweeper {
    store: Arc<dyn RideshareStore>,
    clock: Arc<dyn Clock>,
}

impl ExpirationSweeper {
    pub fn new(store: Arc<dyn RideshareStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// One pass over all ACTIVE rides
    pub async fn sweep(&self) -> SweepSummary {
        let candidates = match self.store.rides_by_status(RideStatus::Active).await {
            Ok(rides) => rides,
            Err(e) => {
                error!("Expiration sweep could not list active rides: {}", e);
                return SweepSummary::default();
            }
        };

        let mut summary = SweepSummary {
            examined: candidates.len(),
            ..SweepSummary::default()
        };
        for ride in candidates {
            match self.expire_if_due(ride.id).await {
                Ok(true) => summary.expired += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!("Failed to expire ride {}: {}", ride.id, e);
                }
            }
        }

        info!(
            "Expiration sweep: {} examined, {} expired, {} failed",
            summary.examined, summary.expired, summary.failed
        );
        summary
    }

    /// Expire one ride if it is still ACTIVE and overdue
    async fn expire_if_due(&self, ride_id: Uuid) -> CoreResult<bool> {
        let mut tx = self.store.begin().await?;
        let Some(mut ride) = tx.ride(ride_id).await? else {
            return Ok(false);
        };
        // Re-check under the transaction; the listing may be stale
        if ride.status != RideStatus::Active {
            return Ok(false);
        }
        let now = self.clock.utc();
        if now <= ride.expires_at() {
            return Ok(false);
        }

        ride.set_status(RideStatus::Expired, now);
        tx.save_ride(&ride).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Sweep forever on a fixed cadence. Meant to be spawned as a
    /// background task.
    pub async fn run(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use campool_core::models::{CostSplit, Destination, Match, RideOffer};
    use campool_core::repository::{StoreCounts, StoreTx};
    use campool_core::StoreError;
    use campool_store::MemoryStore;
    use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct TestClock(Mutex<DateTime<Utc>>);

    impl TestClock {
        fn at(t: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(t)))
        }

        fn set(&self, t: DateTime<Utc>) {
            *self.0.lock().unwrap() = t;
        }
    }

    impl Clock for TestClock {
        fn local(&self) -> DateTime<chrono::Local> {
            self.utc().with_timezone(&chrono::Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 14, 0, 0).unwrap()
    }

    fn ride(status: RideStatus, flexibility_minutes: i32) -> RideOffer {
        RideOffer {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            origin: "Gate 5".to_string(),
            destination: Destination::Lax,
            departure_at: departure(),
            flexible: flexibility_minutes > 0,
            flexibility_minutes,
            max_passengers: 2,
            cost_split: CostSplit::Equal,
            notes: None,
            status,
            created_at: departure() - TimeDelta::days(1),
            updated_at: departure() - TimeDelta::days(1),
        }
    }

    async fn seed(store: &MemoryStore, rides: &[&RideOffer]) {
        let mut tx = store.begin().await.unwrap();
        for r in rides {
            tx.save_ride(r).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let store = Arc::new(MemoryStore::new());
        let clock = TestClock::at(departure());
        let fixed = ride(RideStatus::Active, 0);
        seed(&store, &[&fixed]).await;

        let sweeper = ExpirationSweeper::new(
            Arc::clone(&store) as Arc<dyn RideshareStore>,
            clock.clone(),
        );

        // Exactly at departure the ride survives
        let summary = sweeper.sweep().await;
        assert_eq!(summary, SweepSummary { examined: 1, expired: 0, failed: 0 });
        assert_eq!(
            store.ride(fixed.id).await.unwrap().unwrap().status,
            RideStatus::Active
        );

        // One second past and it expires
        clock.set(departure() + TimeDelta::seconds(1));
        let summary = sweeper.sweep().await;
        assert_eq!(summary, SweepSummary { examined: 1, expired: 1, failed: 0 });
        let expired = store.ride(fixed.id).await.unwrap().unwrap();
        assert_eq!(expired.status, RideStatus::Expired);
        assert_eq!(expired.updated_at, departure() + TimeDelta::seconds(1));
    }

    #[tokio::test]
    async fn test_flexibility_window_delays_expiry() {
        let store = Arc::new(MemoryStore::new());
        let clock = TestClock::at(departure() + TimeDelta::minutes(29));
        let flexible = ride(RideStatus::Active, 30);
        seed(&store, &[&flexible]).await;

        let sweeper = ExpirationSweeper::new(
            Arc::clone(&store) as Arc<dyn RideshareStore>,
            clock.clone(),
        );

        assert_eq!(sweeper.sweep().await.expired, 0);

        clock.set(departure() + TimeDelta::minutes(30));
        assert_eq!(sweeper.sweep().await.expired, 0);

        clock.set(departure() + TimeDelta::minutes(30) + TimeDelta::seconds(1));
        assert_eq!(sweeper.sweep().await.expired, 1);
        assert_eq!(
            store.ride(flexible.id).await.unwrap().unwrap().status,
            RideStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_sweep_only_touches_active_rides() {
        let store = Arc::new(MemoryStore::new());
        let clock = TestClock::at(departure() + TimeDelta::hours(2));
        let matched = ride(RideStatus::Matched, 0);
        let cancelled = ride(RideStatus::Cancelled, 0);
        let overdue = ride(RideStatus::Active, 0);
        seed(&store, &[&matched, &cancelled, &overdue]).await;

        let sweeper =
            ExpirationSweeper::new(Arc::clone(&store) as Arc<dyn RideshareStore>, clock);
        let summary = sweeper.sweep().await;

        assert_eq!(summary, SweepSummary { examined: 1, expired: 1, failed: 0 });
        assert_eq!(
            store.ride(matched.id).await.unwrap().unwrap().status,
            RideStatus::Matched
        );
        assert_eq!(
            store.ride(cancelled.id).await.unwrap().unwrap().status,
            RideStatus::Cancelled
        );
        assert_eq!(
            store.ride(overdue.id).await.unwrap().unwrap().status,
            RideStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_sweep_with_no_active_rides() {
        let store = Arc::new(MemoryStore::new());
        let clock = TestClock::at(departure() + TimeDelta::hours(2));
        let done = ride(RideStatus::Completed, 0);
        seed(&store, &[&done]).await;

        let sweeper =
            ExpirationSweeper::new(Arc::clone(&store) as Arc<dyn RideshareStore>, clock);
        assert_eq!(sweeper.sweep().await, SweepSummary::default());
    }

    /// Store wrapper whose next transaction fails to open
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        fail_next_begin: AtomicBool,
    }

    #[async_trait]
    impl RideshareStore for FlakyStore {
        async fn ride(&self, id: Uuid) -> Result<Option<RideOffer>, StoreError> {
            self.inner.ride(id).await
        }

        async fn match_record(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
            self.inner.match_record(id).await
        }

        async fn rides_by_destination(
            &self,
            destination: Destination,
        ) -> Result<Vec<RideOffer>, StoreError> {
            self.inner.rides_by_destination(destination).await
        }

        async fn rides_by_user(&self, user_id: Uuid) -> Result<Vec<RideOffer>, StoreError> {
            self.inner.rides_by_user(user_id).await
        }

        async fn rides_by_status(&self, status: RideStatus) -> Result<Vec<RideOffer>, StoreError> {
            self.inner.rides_by_status(status).await
        }

        async fn matches_for_ride(&self, ride_id: Uuid) -> Result<Vec<Match>, StoreError> {
            self.inner.matches_for_ride(ride_id).await
        }

        async fn matches_for_user(&self, user_id: Uuid) -> Result<Vec<Match>, StoreError> {
            self.inner.matches_for_user(user_id).await
        }

        async fn live_match_for_pair(&self, a: Uuid, b: Uuid) -> Result<Option<Match>, StoreError> {
            self.inner.live_match_for_pair(a, b).await
        }

        async fn counts(&self) -> Result<StoreCounts, StoreError> {
            self.inner.counts().await
        }

        async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
            if self.fail_next_begin.swap(false, Ordering::SeqCst) {
                return Err("injected begin failure".into());
            }
            self.inner.begin().await
        }
    }

    #[tokio::test]
    async fn test_sweep_isolates_per_ride_failures() {
        let inner = Arc::new(MemoryStore::new());
        let clock = TestClock::at(departure() + TimeDelta::hours(1));
        let first = ride(RideStatus::Active, 0);
        let second = ride(RideStatus::Active, 0);
        seed(&inner, &[&first, &second]).await;

        let flaky = Arc::new(FlakyStore {
            inner: Arc::clone(&inner),
            fail_next_begin: AtomicBool::new(true),
        });
        let sweeper = ExpirationSweeper::new(flaky as Arc<dyn RideshareStore>, clock);

        let summary = sweeper.sweep().await;
        assert_eq!(summary, SweepSummary { examined: 2, expired: 1, failed: 1 });

        // The ride behind the failed transaction is picked up next pass
        let summary = sweeper.sweep().await;
        assert_eq!(summary, SweepSummary { examined: 1, expired: 1, failed: 0 });
        assert!(inner
            .rides_by_status(RideStatus::Active)
            .await
            .unwrap()
            .is_empty());
    }
}
