use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/stats/public", get(public_stats))
}

/// GET /api/stats/public
///
/// Unauthenticated landing-page numbers.
async fn public_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let counts = state
        .store
        .counts()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let top_destinations: Vec<Value> = counts
        .rides_by_destination
        .iter()
        .map(|(destination, rides)| {
            json!({
                "destination": destination.as_str(),
                "rides": rides,
            })
        })
        .collect();

    Ok(Json(json!({
        "totalRides": counts.total_rides,
        "totalMatches": counts.total_matches,
        "acceptedMatches": counts.accepted_matches,
        "topDestinations": top_destinations,
    })))
}
