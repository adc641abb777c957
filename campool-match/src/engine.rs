use std::collections::HashSet;
use std::sync::Arc;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use campool_core::models::{Match, MatchStatus, RideOffer, RideStatus};
use campool_core::repository::RideshareStore;
use campool_core::{CoreError, CoreResult};

use crate::compat::CompatibilityEvaluator;

/// A candidate pairing surfaced by [`MatchingEngine::find_candidates`]
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub ride: RideOffer,
    pub score: f64,
}

/// One of the caller's rides together with everything it could pair with
#[derive(Debug, Clone)]
pub struct RideWithCandidates {
    pub ride: RideOffer,
    pub candidates: Vec<ScoredCandidate>,
}

/// A rider's answer to a suggested match
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchDecision {
    Accepted,
    Rejected,
}

/// Pairs rides and walks matches through their lifecycle.
///
/// Every mutating operation re-reads its preconditions inside a store
/// transaction, so two racing calls cannot both pair the same ride.
pub struct MatchingEngine {
    store: Arc<dyn RideshareStore>,
    clock: Arc<dyn Clock>,
    evaluator: CompatibilityEvaluator,
}

impl MatchingEngine {
    pub fn new(
        store: Arc<dyn RideshareStore>,
        clock: Arc<dyn Clock>,
        evaluator: CompatibilityEvaluator,
    ) -> Self {
        Self {
            store,
            clock,
            evaluator,
        }
    }

    /// Rank every ride the given one could pair with, best score first.
    ///
    /// Skips the ride itself, the owner's other rides, rides that are not
    /// ACTIVE, rides whose departure has passed, and rides already linked
    /// to this one by a match that was not rejected.
    pub async fn find_candidates(&self, ride_id: Uuid) -> CoreResult<Vec<ScoredCandidate>> {
        let ride = self
            .store
            .ride(ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {ride_id}")))?;

        let now = self.clock.utc();
        let linked = self.linked_ride_ids(ride_id).await?;

        let mut candidates = Vec::new();
        for other in self.store.rides_by_destination(ride.destination).await? {
            if other.id == ride.id || other.owner_id == ride.owner_id {
                continue;
            }
            if other.status != RideStatus::Active || other.has_departed(now) {
                continue;
            }
            if linked.contains(&other.id) {
                continue;
            }
            if !self.evaluator.compatible(&ride, &other) {
                continue;
            }
            let score = self.evaluator.score(&ride, &other);
            candidates.push(ScoredCandidate { ride: other, score });
        }
        candidates.sort_by(|x, y| {
            y.score
                .partial_cmp(&x.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(
            "Found {} candidates for ride {}",
            candidates.len(),
            ride_id
        );
        Ok(candidates)
    }

    /// Every ACTIVE, not yet departed ride of the user, each with its
    /// ranked candidates
    pub async fn rides_with_candidates(
        &self,
        user_id: Uuid,
    ) -> CoreResult<Vec<RideWithCandidates>> {
        let now = self.clock.utc();
        let mut out = Vec::new();
        for ride in self.store.rides_by_user(user_id).await? {
            if ride.status != RideStatus::Active || ride.has_departed(now) {
                continue;
            }
            let candidates = self.find_candidates(ride.id).await?;
            out.push(RideWithCandidates { ride, candidates });
        }
        Ok(out)
    }

    /// Pair the caller's ride with a target immediately, marking both
    /// rides MATCHED. A pending suggestion between the two is promoted
    /// instead of duplicated.
    pub async fn join(
        &self,
        my_ride_id: Uuid,
        target_ride_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Match> {
        if my_ride_id == target_ride_id {
            return Err(CoreError::InvalidState(
                "a ride cannot be paired with itself".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut my_ride = tx
            .ride(my_ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {my_ride_id}")))?;
        let mut target = tx
            .ride(target_ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {target_ride_id}")))?;

        self.check_pair(&my_ride, &target, user_id)?;

        let now = self.clock.utc();
        let score = self.evaluator.score(&my_ride, &target);
        let record = match tx.live_match_for_pair(my_ride_id, target_ride_id).await? {
            Some(existing) if existing.status == MatchStatus::Accepted => {
                return Err(CoreError::InvalidState(
                    "these rides are already matched".to_string(),
                ));
            }
            Some(mut suggestion) => {
                suggestion.status = MatchStatus::Accepted;
                suggestion.score = score;
                suggestion.confirmed_at = Some(now);
                suggestion
            }
            None => Match::accepted(my_ride_id, target_ride_id, score, now),
        };

        my_ride.set_status(RideStatus::Matched, now);
        target.set_status(RideStatus::Matched, now);
        tx.save_ride(&my_ride).await?;
        tx.save_ride(&target).await?;
        tx.save_match(&record).await?;
        tx.commit().await?;

        info!(
            "Matched rides {} and {} (match {}, score {:.2})",
            my_ride_id, target_ride_id, record.id, record.score
        );
        Ok(record)
    }

    /// Suggest a pairing and leave both rides ACTIVE until the other
    /// rider answers. Returns the existing suggestion unchanged if one
    /// is already pending for the pair.
    pub async fn request(
        &self,
        my_ride_id: Uuid,
        target_ride_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Match> {
        if my_ride_id == target_ride_id {
            return Err(CoreError::InvalidState(
                "a ride cannot be paired with itself".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let my_ride = tx
            .ride(my_ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {my_ride_id}")))?;
        let target = tx
            .ride(target_ride_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {target_ride_id}")))?;

        self.check_pair(&my_ride, &target, user_id)?;

        match tx.live_match_for_pair(my_ride_id, target_ride_id).await? {
            Some(existing) if existing.status == MatchStatus::Accepted => Err(
                CoreError::InvalidState("these rides are already matched".to_string()),
            ),
            Some(pending) => Ok(pending),
            None => {
                let score = self.evaluator.score(&my_ride, &target);
                let record = Match::suggested(my_ride_id, target_ride_id, score, self.clock.utc());
                tx.save_match(&record).await?;
                tx.commit().await?;
                info!(
                    "Suggested match {} between rides {} and {}",
                    record.id, my_ride_id, target_ride_id
                );
                Ok(record)
            }
        }
    }

    /// Accept or reject a suggested match. Accepting re-checks that both
    /// rides are still ACTIVE and then marks them MATCHED; rejecting
    /// leaves them untouched.
    pub async fn respond(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        decision: MatchDecision,
    ) -> CoreResult<Match> {
        let mut tx = self.store.begin().await?;
        let mut record = tx
            .match_record(match_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        let mut ride_a = tx
            .ride(record.ride_a)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {}", record.ride_a)))?;
        let mut ride_b = tx
            .ride(record.ride_b)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {}", record.ride_b)))?;

        if ride_a.owner_id != user_id && ride_b.owner_id != user_id {
            return Err(CoreError::PermissionDenied(
                "you are not part of this match".to_string(),
            ));
        }
        if record.status != MatchStatus::Suggested {
            return Err(CoreError::InvalidState(
                "only suggested matches can be answered".to_string(),
            ));
        }

        let now = self.clock.utc();
        match decision {
            MatchDecision::Accepted => {
                if ride_a.status != RideStatus::Active || ride_b.status != RideStatus::Active {
                    return Err(CoreError::InvalidState(
                        "one of the rides is no longer available".to_string(),
                    ));
                }
                record.status = MatchStatus::Accepted;
                record.confirmed_at = Some(now);
                ride_a.set_status(RideStatus::Matched, now);
                ride_b.set_status(RideStatus::Matched, now);
                tx.save_ride(&ride_a).await?;
                tx.save_ride(&ride_b).await?;
            }
            MatchDecision::Rejected => {
                record.status = MatchStatus::Rejected;
            }
        }
        tx.save_match(&record).await?;
        tx.commit().await?;

        info!("Match {} answered: {:?}", match_id, decision);
        Ok(record)
    }

    /// Remove a SUGGESTED or ACCEPTED match. Cancelling an accepted
    /// match returns both rides to ACTIVE; dropping a suggestion leaves
    /// ride statuses alone.
    pub async fn cancel(&self, match_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        let mut tx = self.store.begin().await?;
        let record = tx
            .match_record(match_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        let mut ride_a = tx
            .ride(record.ride_a)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {}", record.ride_a)))?;
        let mut ride_b = tx
            .ride(record.ride_b)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {}", record.ride_b)))?;

        if ride_a.owner_id != user_id && ride_b.owner_id != user_id {
            return Err(CoreError::PermissionDenied(
                "you are not part of this match".to_string(),
            ));
        }
        if matches!(record.status, MatchStatus::Completed | MatchStatus::Rejected) {
            return Err(CoreError::ConstraintViolation(
                "only suggested or accepted matches can be cancelled".to_string(),
            ));
        }

        if record.status == MatchStatus::Accepted {
            let now = self.clock.utc();
            ride_a.set_status(RideStatus::Active, now);
            ride_b.set_status(RideStatus::Active, now);
            tx.save_ride(&ride_a).await?;
            tx.save_ride(&ride_b).await?;
        }
        tx.delete_match(record.id).await?;
        tx.commit().await?;

        info!("Match {} cancelled by {}", match_id, user_id);
        Ok(())
    }

    /// Mark an accepted match and both of its rides COMPLETED
    pub async fn complete(&self, match_id: Uuid, user_id: Uuid) -> CoreResult<Match> {
        let mut tx = self.store.begin().await?;
        let mut record = tx
            .match_record(match_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;
        let mut ride_a = tx
            .ride(record.ride_a)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {}", record.ride_a)))?;
        let mut ride_b = tx
            .ride(record.ride_b)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("ride {}", record.ride_b)))?;

        if ride_a.owner_id != user_id && ride_b.owner_id != user_id {
            return Err(CoreError::PermissionDenied(
                "you are not part of this match".to_string(),
            ));
        }
        if record.status != MatchStatus::Accepted {
            return Err(CoreError::InvalidState(
                "only accepted matches can be completed".to_string(),
            ));
        }

        let now = self.clock.utc();
        record.status = MatchStatus::Completed;
        record.completed_at = Some(now);
        ride_a.set_status(RideStatus::Completed, now);
        ride_b.set_status(RideStatus::Completed, now);
        tx.save_ride(&ride_a).await?;
        tx.save_ride(&ride_b).await?;
        tx.save_match(&record).await?;
        tx.commit().await?;

        info!("Match {} completed", match_id);
        Ok(record)
    }

    /// The user's most recently confirmed ACCEPTED match, if any
    pub async fn current_match(&self, user_id: Uuid) -> CoreResult<Option<Match>> {
        let matches = self.store.matches_for_user(user_id).await?;
        Ok(matches
            .into_iter()
            .filter(|m| m.status == MatchStatus::Accepted)
            .max_by_key(|m| m.confirmed_at))
    }

    /// Full match history for the user, newest first
    pub async fn user_matches(&self, user_id: Uuid) -> CoreResult<Vec<Match>> {
        Ok(self.store.matches_for_user(user_id).await?)
    }

    /// Shared preconditions for `join` and `request`
    fn check_pair(&self, my_ride: &RideOffer, target: &RideOffer, user_id: Uuid) -> CoreResult<()> {
        if my_ride.owner_id != user_id {
            return Err(CoreError::PermissionDenied(
                "you can only pair from your own ride".to_string(),
            ));
        }
        if my_ride.destination != target.destination {
            return Err(CoreError::InvalidState(
                "rides must go to the same destination".to_string(),
            ));
        }
        if target.status != RideStatus::Active {
            return Err(CoreError::InvalidState(
                "target ride is not available for matching".to_string(),
            ));
        }
        if matches!(my_ride.status, RideStatus::Matched | RideStatus::Completed) {
            return Err(CoreError::InvalidState(
                "your ride is already matched or completed".to_string(),
            ));
        }
        if matches!(my_ride.status, RideStatus::Cancelled | RideStatus::Expired) {
            return Err(CoreError::InvalidState(
                "your ride is cancelled or expired".to_string(),
            ));
        }
        if !self.evaluator.compatible(my_ride, target) {
            return Err(CoreError::InvalidState(
                "departure times are not compatible".to_string(),
            ));
        }
        Ok(())
    }

    async fn linked_ride_ids(&self, ride_id: Uuid) -> CoreResult<HashSet<Uuid>> {
        let mut linked = HashSet::new();
        for record in self.store.matches_for_ride(ride_id).await? {
            if record.status == MatchStatus::Rejected {
                continue;
            }
            if let Some(other) = record.other_ride(ride_id) {
                linked.insert(other);
            }
        }
        Ok(linked)
    }
}
