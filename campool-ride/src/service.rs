use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use mockable::Clock;
use tracing::info;
use uuid::Uuid;

use campool_core::models::{CostSplit, Destination, RideOffer, RideStatus};
use campool_core::repository::RideshareStore;
use campool_core::{CoreError, CoreResult};

const MAX_NOTES_CHARS: usize = 300;

/// Input for posting a new ride. The destination stays a raw string here
/// so one validation path covers every caller.
#[derive(Debug, Clone)]
pub struct RideDraft {
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub flexible: bool,
    pub flexibility_minutes: i32,
    pub max_passengers: i32,
    pub cost_split: CostSplit,
    pub notes: Option<String>,
}

/// Optional narrowing of the active ride listing
#[derive(Debug, Clone, Default)]
pub struct RideFilter {
    pub destination: Option<String>,
    /// Local calendar date of departure
    pub date: Option<NaiveDate>,
    /// Local wall-clock time; flexible rides match within their window
    pub time: Option<NaiveTime>,
}

/// Creation, listing and cancellation of ride offers
pub struct RideService {
    store: Arc<dyn RideshareStore>,
    clock: Arc<dyn Clock>,
}

impl RideService {
    pub fn new(store: Arc<dyn RideshareStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate a draft and persist it as an ACTIVE ride
    pub async fn create(&self, owner_id: Uuid, draft: RideDraft) -> CoreResult<RideOffer> {
        if draft.origin.trim().is_empty() {
            return Err(CoreError::InvalidState("origin is required".to_string()));
        }
        let destination = Destination::parse(&draft.destination).ok_or_else(|| {
            CoreError::InvalidState(format!("unknown destination: {}", draft.destination))
        })?;
        if draft.flexibility_minutes < 0 {
            return Err(CoreError::InvalidState(
                "time flexibility cannot be negative".to_string(),
            ));
        }
        if draft.flexible && draft.flexibility_minutes == 0 {
            return Err(CoreError::InvalidState(
                "flexible rides need a flexibility window greater than zero".to_string(),
            ));
        }
        if !(1..=3).contains(&draft.max_passengers) {
            return Err(CoreError::InvalidState(
                "max passengers must be between 1 and 3".to_string(),
            ));
        }
        if let Some(notes) = &draft.notes {
            if notes.chars().count() > MAX_NOTES_CHARS {
                return Err(CoreError::InvalidState(format!(
                    "notes must be at most {MAX_NOTES_CHARS} characters"
                )));
            }
        }

        let now = self.clock.utc();
        let ride = RideOffer {
            id: Uuid::new_v4(),
            owner_id,
            origin: draft.origin,
            destination,
            departure_at: draft.departure_at,
            flexible: draft.flexible,
            flexibility_minutes: draft.flexibility_minutes,
            max_passengers: draft.max_passengers,
            cost_split: draft.cost_split,
            notes: draft.notes,
            status: RideStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.save_ride(&ride).await?;
        tx.commit().await?;

        info!(
            "Ride {} posted by {} to {}",
            ride.id,
            owner_id,
            destination.as_str()
        );
        Ok(ride)
    }

    pub async fn get(&self, ride_id: Uuid) -> CoreResult<RideOffer> {
        self.store
            .ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {ride_id}")))
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<RideOffer>> {
        Ok(self.store.rides_by_user(user_id).await?)
    }

    /// ACTIVE rides, newest first, narrowed by the filter
    pub async fn list_active(&self, filter: &RideFilter) -> CoreResult<Vec<RideOffer>> {
        let mut rides = self.store.rides_by_status(RideStatus::Active).await?;

        if let Some(input) = &filter.destination {
            let destination = Destination::parse(input).ok_or_else(|| {
                CoreError::InvalidState(format!("unknown destination: {input}"))
            })?;
            rides.retain(|ride| ride.destination == destination);
        }
        if let Some(date) = filter.date {
            rides.retain(|ride| ride.departure_at.with_timezone(&Local).date_naive() == date);
        }
        if let Some(time) = filter.time {
            rides.retain(|ride| Self::departs_around(ride, time));
        }
        Ok(rides)
    }

    /// Cancel an ACTIVE ride. Rides holding a live match must drop the
    /// match first; finished rides stay as they are.
    pub async fn cancel(&self, ride_id: Uuid, user_id: Uuid) -> CoreResult<RideOffer> {
        let mut tx = self.store.begin().await?;
        let mut ride = tx
            .ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {ride_id}")))?;

        if ride.owner_id != user_id {
            return Err(CoreError::PermissionDenied(
                "you can only cancel your own rides".to_string(),
            ));
        }
        match ride.status {
            RideStatus::Cancelled => {
                return Err(CoreError::ConstraintViolation(
                    "ride is already cancelled".to_string(),
                ));
            }
            RideStatus::Completed | RideStatus::Expired => {
                return Err(CoreError::InvalidState(
                    "finished rides cannot be cancelled".to_string(),
                ));
            }
            RideStatus::Active | RideStatus::Matched => {}
        }

        let live = tx
            .matches_for_ride(ride_id)
            .await?
            .into_iter()
            .filter(|record| record.is_live())
            .count();
        if live > 0 {
            return Err(CoreError::InvalidState(
                "cancel the ride's match before cancelling the ride".to_string(),
            ));
        }

        ride.set_status(RideStatus::Cancelled, self.clock.utc());
        tx.save_ride(&ride).await?;
        tx.commit().await?;

        info!("Ride {} cancelled by {}", ride_id, user_id);
        Ok(ride)
    }

    /// Exact wall-clock hit, or within the ride's window when flexible
    fn departs_around(ride: &RideOffer, wanted: NaiveTime) -> bool {
        let departure = ride.departure_at.with_timezone(&Local).time();
        if departure == wanted {
            return true;
        }
        if ride.flexible && ride.flexibility_minutes > 0 {
            let gap = (departure - wanted).num_minutes().abs();
            return gap <= i64::from(ride.flexibility_minutes);
        }
        false
    }
}
