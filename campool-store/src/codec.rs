//! Mapping between domain enums and their stored string form.
//!
//! Rows keep statuses as lowercase strings; everything crossing the store
//! boundary goes through these pure functions, and unknown strings are
//! rejected instead of silently defaulted.

use campool_core::models::{CostSplit, Destination, MatchStatus, RideStatus};
use campool_core::StoreError;

pub fn ride_status_to_db(status: RideStatus) -> &'static str {
    match status {
        RideStatus::Active => "active",
        RideStatus::Matched => "matched",
        RideStatus::Completed => "completed",
        RideStatus::Cancelled => "cancelled",
        RideStatus::Expired => "expired",
    }
}

pub fn ride_status_from_db(value: &str) -> Result<RideStatus, StoreError> {
    match value {
        "active" => Ok(RideStatus::Active),
        "matched" => Ok(RideStatus::Matched),
        "completed" => Ok(RideStatus::Completed),
        "cancelled" => Ok(RideStatus::Cancelled),
        "expired" => Ok(RideStatus::Expired),
        other => Err(format!("unknown ride status in store: {other}").into()),
    }
}

pub fn match_status_to_db(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Suggested => "suggested",
        MatchStatus::Accepted => "accepted",
        MatchStatus::Rejected => "rejected",
        MatchStatus::Completed => "completed",
    }
}

pub fn match_status_from_db(value: &str) -> Result<MatchStatus, StoreError> {
    match value {
        "suggested" => Ok(MatchStatus::Suggested),
        "accepted" => Ok(MatchStatus::Accepted),
        "rejected" => Ok(MatchStatus::Rejected),
        "completed" => Ok(MatchStatus::Completed),
        other => Err(format!("unknown match status in store: {other}").into()),
    }
}

pub fn destination_to_db(destination: Destination) -> &'static str {
    match destination {
        Destination::Lax => "lax",
        Destination::Bur => "bur",
        Destination::Ont => "ont",
        Destination::UnionStation => "union_station",
    }
}

pub fn destination_from_db(value: &str) -> Result<Destination, StoreError> {
    match value {
        "lax" => Ok(Destination::Lax),
        "bur" => Ok(Destination::Bur),
        "ont" => Ok(Destination::Ont),
        "union_station" => Ok(Destination::UnionStation),
        other => Err(format!("unknown destination in store: {other}").into()),
    }
}

pub fn cost_split_to_db(split: CostSplit) -> &'static str {
    match split {
        CostSplit::Equal => "equal",
        CostSplit::ByDistance => "by_distance",
    }
}

pub fn cost_split_from_db(value: &str) -> Result<CostSplit, StoreError> {
    match value {
        "equal" => Ok(CostSplit::Equal),
        "by_distance" => Ok(CostSplit::ByDistance),
        other => Err(format!("unknown cost split in store: {other}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_string_contract() {
        assert_eq!(ride_status_to_db(RideStatus::Active), "active");
        assert_eq!(ride_status_to_db(RideStatus::Matched), "matched");
        assert_eq!(ride_status_to_db(RideStatus::Completed), "completed");
        assert_eq!(ride_status_to_db(RideStatus::Cancelled), "cancelled");
        assert_eq!(ride_status_to_db(RideStatus::Expired), "expired");
        assert_eq!(match_status_to_db(MatchStatus::Suggested), "suggested");
        assert_eq!(match_status_to_db(MatchStatus::Rejected), "rejected");
        assert_eq!(destination_to_db(Destination::UnionStation), "union_station");
        assert_eq!(cost_split_to_db(CostSplit::ByDistance), "by_distance");

        assert_eq!(ride_status_from_db("expired").unwrap(), RideStatus::Expired);
        assert_eq!(
            match_status_from_db("accepted").unwrap(),
            MatchStatus::Accepted
        );
        assert_eq!(
            destination_from_db("union_station").unwrap(),
            Destination::UnionStation
        );
        assert_eq!(cost_split_from_db("equal").unwrap(), CostSplit::Equal);
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(ride_status_from_db("ACTIVE").is_err());
        assert!(ride_status_from_db("paused").is_err());
        assert!(match_status_from_db("").is_err());
        assert!(destination_from_db("sfo").is_err());
        assert!(cost_split_from_db("by-distance").is_err());
    }
}
