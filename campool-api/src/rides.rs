use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use campool_core::models::{CostSplit, Destination, RideOffer, RideStatus};
use campool_ride::{RideDraft, RideFilter};

use crate::error::AppError;
use crate::identity::CallerId;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub origin_location: String,
    pub destination: String,
    pub departure_datetime: DateTime<Utc>,
    #[serde(default)]
    pub flexible_time: bool,
    #[serde(default)]
    pub time_flexibility_minutes: i32,
    #[serde(default = "default_max_passengers")]
    pub max_passengers: i32,
    #[serde(default)]
    pub cost_split_preference: CostSplit,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_max_passengers() -> i32 {
    2
}

#[derive(Debug, Deserialize)]
pub struct ListRidesQuery {
    /// Destination code, e.g. `LAX`.
    pub destination: Option<String>,
    /// Local calendar date, `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,
    /// Local time of day, `HH:MM:SS`.
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideResponse {
    pub ride_id: Uuid,
    pub user_id: Uuid,
    pub origin_location: String,
    pub destination: Destination,
    pub departure_datetime: DateTime<Utc>,
    pub flexible_time: bool,
    pub time_flexibility_minutes: i32,
    pub max_passengers: i32,
    pub cost_split_preference: CostSplit,
    pub notes: Option<String>,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RideOffer> for RideResponse {
    fn from(ride: RideOffer) -> Self {
        RideResponse {
            ride_id: ride.id,
            user_id: ride.owner_id,
            origin_location: ride.origin,
            destination: ride.destination,
            departure_datetime: ride.departure_at,
            flexible_time: ride.flexible,
            time_flexibility_minutes: ride.flexibility_minutes,
            max_passengers: ride.max_passengers,
            cost_split_preference: ride.cost_split,
            notes: ride.notes,
            status: ride.status,
            created_at: ride.created_at,
            updated_at: ride.updated_at,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/rides", post(create_ride).get(list_rides))
        .route("/api/rides/my-rides", get(my_rides))
        .route("/api/rides/{id}", get(get_ride))
        .route("/api/rides/{id}/cancel", post(cancel_ride))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/rides
async fn create_ride(
    State(state): State<AppState>,
    caller: CallerId,
    Json(req): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideResponse>), AppError> {
    let draft = RideDraft {
        origin: req.origin_location,
        destination: req.destination,
        departure_at: req.departure_datetime,
        flexible: req.flexible_time,
        flexibility_minutes: req.time_flexibility_minutes,
        max_passengers: req.max_passengers,
        cost_split: req.cost_split_preference,
        notes: req.notes,
    };

    let ride = state.rides.create(caller.0, draft).await?;
    info!("User {} posted ride {}", caller.0, ride.id);

    Ok((StatusCode::CREATED, Json(ride.into())))
}

/// GET /api/rides?destination=LAX&date=2026-06-10&time=14:00:00
async fn list_rides(
    State(state): State<AppState>,
    _caller: CallerId,
    Query(query): Query<ListRidesQuery>,
) -> Result<Json<Vec<RideResponse>>, AppError> {
    let filter = RideFilter {
        destination: query.destination,
        date: query.date,
        time: query.time,
    };

    let rides = state.rides.list_active(&filter).await?;
    Ok(Json(rides.into_iter().map(RideResponse::from).collect()))
}

/// GET /api/rides/my-rides
async fn my_rides(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<Vec<RideResponse>>, AppError> {
    let rides = state.rides.list_by_user(caller.0).await?;
    Ok(Json(rides.into_iter().map(RideResponse::from).collect()))
}

/// GET /api/rides/{id}
async fn get_ride(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<RideResponse>, AppError> {
    let ride = state.rides.get(id).await?;
    Ok(Json(ride.into()))
}

/// POST /api/rides/{id}/cancel
async fn cancel_ride(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> Result<Json<RideResponse>, AppError> {
    let ride = state.rides.cancel(id, caller.0).await?;
    info!("User {} cancelled ride {}", caller.0, id);
    Ok(Json(ride.into()))
}
