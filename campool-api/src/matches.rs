use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use campool_core::models::{Match, MatchStatus};
use campool_match::MatchDecision;

use crate::error::AppError;
use crate::identity::CallerId;
use crate::rides::RideResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    pub my_ride_id: Uuid,
    pub target_ride_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: MatchDecision,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub match_id: Uuid,
    pub ride1_id: Uuid,
    pub ride2_id: Uuid,
    pub status: MatchStatus,
    pub match_score: f64,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Match> for MatchResponse {
    fn from(record: Match) -> Self {
        MatchResponse {
            match_id: record.id,
            ride1_id: record.ride_a,
            ride2_id: record.ride_b,
            status: record.status,
            match_score: record.score,
            created_at: record.created_at,
            confirmed_at: record.confirmed_at,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResponse {
    pub candidate_ride: RideResponse,
    pub match_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideWithCandidatesResponse {
    pub ride: RideResponse,
    pub potential_matches: Vec<CandidateResponse>,
    pub has_potential_matches: bool,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/matches", get(history))
        .route("/api/matches/potential/{ride_id}", get(potential))
        .route("/api/matches/my-rides", get(my_rides))
        .route("/api/matches/join", post(join))
        .route("/api/matches/request", post(request_match))
        .route("/api/matches/current", get(current))
        .route("/api/matches/{id}/status", put(respond))
        .route("/api/matches/{id}/complete", post(complete))
        .route("/api/matches/{id}", delete(cancel))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/matches/potential/{ride_id}
async fn potential(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<CandidateResponse>>, AppError> {
    let candidates = state.matching.find_candidates(ride_id).await?;
    let body = candidates
        .into_iter()
        .map(|c| CandidateResponse {
            candidate_ride: c.ride.into(),
            match_score: c.score,
        })
        .collect();
    Ok(Json(body))
}

/// GET /api/matches/my-rides
async fn my_rides(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<Vec<RideWithCandidatesResponse>>, AppError> {
    let rides = state.matching.rides_with_candidates(caller.0).await?;
    let body = rides
        .into_iter()
        .map(|entry| {
            let potential_matches: Vec<CandidateResponse> = entry
                .candidates
                .into_iter()
                .map(|c| CandidateResponse {
                    candidate_ride: c.ride.into(),
                    match_score: c.score,
                })
                .collect();
            RideWithCandidatesResponse {
                ride: entry.ride.into(),
                has_potential_matches: !potential_matches.is_empty(),
                potential_matches,
            }
        })
        .collect();
    Ok(Json(body))
}

/// POST /api/matches/join
async fn join(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<PairRequest>,
) -> Result<(StatusCode, Json<MatchResponse>), AppError> {
    let record = state
        .matching
        .join(req.my_ride_id, req.target_ride_id, caller.0)
        .await?;
    info!("User {} joined ride {} with {}", caller.0, req.my_ride_id, req.target_ride_id);
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// POST /api/matches/request
async fn request_match(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<PairRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    let record = state
        .matching
        .request(req.my_ride_id, req.target_ride_id, caller.0)
        .await?;
    Ok(Json(record.into()))
}

/// PUT /api/matches/{id}/status
async fn respond(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    let record = state.matching.respond(id, caller.0, req.status).await?;
    Ok(Json(record.into()))
}

/// POST /api/matches/{id}/complete
async fn complete(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchResponse>, AppError> {
    let record = state.matching.complete(id, caller.0).await?;
    Ok(Json(record.into()))
}

/// DELETE /api/matches/{id}
async fn cancel(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.matching.cancel(id, caller.0).await?;
    info!("User {} cancelled match {}", caller.0, id);
    Ok(Json(json!({ "message": "Match cancelled" })))
}

/// GET /api/matches/current
async fn current(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<Value>, AppError> {
    let body = match state.matching.current_match(caller.0).await? {
        Some(record) => json!({
            "hasMatch": true,
            "match": MatchResponse::from(record),
        }),
        None => json!({ "hasMatch": false, "match": null }),
    };
    Ok(Json(body))
}

/// GET /api/matches
async fn history(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<Vec<MatchResponse>>, AppError> {
    let records = state.matching.user_matches(caller.0).await?;
    Ok(Json(records.into_iter().map(MatchResponse::from).collect()))
}
