use campool_core::models::RideOffer;
use chrono::Local;

/// Tunable knobs for pairing decisions
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    /// Largest departure gap in minutes when neither ride is flexible
    pub tolerance_minutes: i64,
    /// Substring that marks an origin as an on-campus pickup point
    pub campus_marker: String,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            tolerance_minutes: 30,
            campus_marker: "campus".to_string(),
        }
    }
}

/// Pure pairwise compatibility and scoring over ride offers
pub struct CompatibilityEvaluator {
    policy: MatchPolicy,
}

impl CompatibilityEvaluator {
    pub fn new(mut policy: MatchPolicy) -> Self {
        policy.campus_marker = policy.campus_marker.trim().to_lowercase();
        Self { policy }
    }

    /// Departure gap in whole wall-clock minutes. Comparing local wall
    /// times keeps "14:00 vs 14:20" meaning twenty minutes to the rider.
    fn departure_gap_minutes(a: &RideOffer, b: &RideOffer) -> i64 {
        let a_local = a.departure_at.with_timezone(&Local).naive_local();
        let b_local = b.departure_at.with_timezone(&Local).naive_local();
        (a_local - b_local).num_minutes().abs()
    }

    /// Whether two rides could plausibly share a car.
    ///
    /// Flexible riders pool their windows; when only one side is flexible
    /// its window alone applies; two fixed departures fall back to the
    /// policy tolerance.
    pub fn compatible(&self, a: &RideOffer, b: &RideOffer) -> bool {
        let gap = Self::departure_gap_minutes(a, b);
        match (a.flexible, b.flexible) {
            (true, true) => {
                gap <= i64::from(a.flexibility_minutes) + i64::from(b.flexibility_minutes)
            }
            (true, false) => gap <= i64::from(a.flexibility_minutes),
            (false, true) => gap <= i64::from(b.flexibility_minutes),
            (false, false) => gap <= self.policy.tolerance_minutes,
        }
    }

    /// Score a pair in [0, 1]. Deterministic and symmetric: no clock
    /// reads, no randomness, same result for (a, b) and (b, a).
    ///
    /// Starts from 1.0, subtracts 0.005 per minute of departure gap
    /// (capped at 0.5), then rewards an equal cost split (+0.10), close
    /// passenger capacities (+0.05 per step of closeness up to +0.15),
    /// and origins that are identical (+0.15) or share the campus
    /// marker (+0.10).
    pub fn score(&self, a: &RideOffer, b: &RideOffer) -> f64 {
        let mut score = 1.0_f64;

        let gap = Self::departure_gap_minutes(a, b) as f64;
        score -= (gap * 0.005).min(0.5);

        if a.cost_split == b.cost_split {
            score += 0.10;
        }

        let capacity_gap = (a.max_passengers - b.max_passengers).abs();
        score += f64::from(3 - capacity_gap) * 0.05;

        let origin_a = a.origin.trim().to_lowercase();
        let origin_b = b.origin.trim().to_lowercase();
        let marker = &self.policy.campus_marker;
        if origin_a == origin_b {
            score += 0.15;
        } else if !marker.is_empty() && origin_a.contains(marker) && origin_b.contains(marker) {
            score += 0.10;
        }

        score.clamp(0.0, 1.0)
    }
}
