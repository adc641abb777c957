use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed set of trip hubs rides can target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Destination {
    Lax,
    Bur,
    Ont,
    UnionStation,
}

impl Destination {
    pub const ALL: [Destination; 4] = [
        Destination::Lax,
        Destination::Bur,
        Destination::Ont,
        Destination::UnionStation,
    ];

    /// Parse a user-supplied hub name ("LAX", "union station", ...)
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_uppercase().replace(' ', "_").as_str() {
            "LAX" => Some(Destination::Lax),
            "BUR" => Some(Destination::Bur),
            "ONT" => Some(Destination::Ont),
            "UNION_STATION" => Some(Destination::UnionStation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Lax => "LAX",
            Destination::Bur => "BUR",
            Destination::Ont => "ONT",
            Destination::UnionStation => "UNION_STATION",
        }
    }
}

/// How riders want to divide the fare
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostSplit {
    Equal,
    ByDistance,
}

impl Default for CostSplit {
    fn default() -> Self {
        CostSplit::Equal
    }
}

/// Ride lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Active,
    Matched,
    Completed,
    Cancelled,
    Expired,
}

impl RideStatus {
    /// Terminal rides never re-enter matching
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::Expired
        )
    }
}

/// Match lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Suggested,
    Accepted,
    Rejected,
    Completed,
}

/// A posted ride offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideOffer {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub origin: String,
    pub destination: Destination,
    pub departure_at: DateTime<Utc>,
    pub flexible: bool,
    pub flexibility_minutes: i32,
    pub max_passengers: i32,
    pub cost_split: CostSplit,
    pub notes: Option<String>,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RideOffer {
    /// Move the ride to a new status, touching `updated_at`
    pub fn set_status(&mut self, status: RideStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Instant after which an unmatched ride is considered stale
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.departure_at + Duration::minutes(i64::from(self.flexibility_minutes))
    }

    /// Whether the departure moment has already passed
    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departure_at <= now
    }
}

/// A pairing between two rides heading to the same destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub ride_a: Uuid,
    pub ride_b: Uuid,
    pub score: f64,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Create a pending suggestion awaiting the other rider's answer
    pub fn suggested(ride_a: Uuid, ride_b: Uuid, score: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_a,
            ride_b,
            score,
            status: MatchStatus::Suggested,
            created_at: now,
            confirmed_at: None,
            completed_at: None,
        }
    }

    /// Create a match confirmed by both sides from the start
    pub fn accepted(ride_a: Uuid, ride_b: Uuid, score: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_a,
            ride_b,
            score,
            status: MatchStatus::Accepted,
            created_at: now,
            confirmed_at: Some(now),
            completed_at: None,
        }
    }

    /// Whether this match references the given ride
    pub fn links(&self, ride_id: Uuid) -> bool {
        self.ride_a == ride_id || self.ride_b == ride_id
    }

    /// The ride on the opposite side of `ride_id`, if any
    pub fn other_ride(&self, ride_id: Uuid) -> Option<Uuid> {
        if self.ride_a == ride_id {
            Some(self.ride_b)
        } else if self.ride_b == ride_id {
            Some(self.ride_a)
        } else {
            None
        }
    }

    /// Whether this match references the same unordered pair of rides
    pub fn is_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.ride_a == a && self.ride_b == b) || (self.ride_a == b && self.ride_b == a)
    }

    /// SUGGESTED and ACCEPTED matches block new pairings for their rides
    pub fn is_live(&self) -> bool {
        matches!(self.status, MatchStatus::Suggested | MatchStatus::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_destination_parsing() {
        assert_eq!(Destination::parse("LAX"), Some(Destination::Lax));
        assert_eq!(Destination::parse("lax"), Some(Destination::Lax));
        assert_eq!(
            Destination::parse("union station"),
            Some(Destination::UnionStation)
        );
        assert_eq!(
            Destination::parse(" Union_Station "),
            Some(Destination::UnionStation)
        );
        assert_eq!(Destination::parse("SFO"), None);
        assert_eq!(Destination::parse(""), None);
    }

    #[test]
    fn test_ride_expiry_window() {
        let departure = Utc.with_ymd_and_hms(2026, 6, 10, 14, 0, 0).unwrap();
        let mut ride = sample_ride(departure);
        ride.flexibility_minutes = 30;
        assert_eq!(
            ride.expires_at(),
            Utc.with_ymd_and_hms(2026, 6, 10, 14, 30, 0).unwrap()
        );

        ride.flexibility_minutes = 0;
        assert_eq!(ride.expires_at(), departure);
    }

    #[test]
    fn test_match_pair_helpers() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 14, 0, 0).unwrap();
        let m = Match::suggested(a, b, 0.8, now);

        assert!(m.is_pair(a, b));
        assert!(m.is_pair(b, a));
        assert!(!m.is_pair(a, Uuid::new_v4()));
        assert_eq!(m.other_ride(a), Some(b));
        assert_eq!(m.other_ride(b), Some(a));
        assert_eq!(m.other_ride(Uuid::new_v4()), None);
        assert!(m.is_live());
        assert!(m.confirmed_at.is_none());
    }

    #[test]
    fn test_accepted_match_confirmation() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 14, 0, 0).unwrap();
        let m = Match::accepted(Uuid::new_v4(), Uuid::new_v4(), 1.0, now);
        assert_eq!(m.status, MatchStatus::Accepted);
        assert_eq!(m.confirmed_at, Some(now));
        assert!(m.completed_at.is_none());
    }

    fn sample_ride(departure: DateTime<Utc>) -> RideOffer {
        RideOffer {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            origin: "North Campus Garage".to_string(),
            destination: Destination::Lax,
            departure_at: departure,
            flexible: true,
            flexibility_minutes: 15,
            max_passengers: 2,
            cost_split: CostSplit::Equal,
            notes: None,
            status: RideStatus::Active,
            created_at: departure - Duration::days(1),
            updated_at: departure - Duration::days(1),
        }
    }
}
