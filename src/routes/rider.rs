use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{AuthenticatedUser, CurrentUser},
    domain::{match_pending_trips, Actor, TripEvent, TripMatch},
    error::AppError,
    extract::{Json, Path, Query},
    models::{
        trip::{TripDetail, TripStatus},
        vehicle::{Vehicle, VehicleForm},
    },
    services::trips::{Earnings, EarningsPeriod, RatingSummary},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending-trips", get(pending_trips))
        .route("/active-trips", get(active_trips))
        .route("/trips/history", get(trip_history))
        .route("/trips/:id", get(trip_detail))
        .route("/trips/:id/accept", put(trip_accept))
        .route("/trips/:id/reject", put(trip_reject))
        .route("/trips/:id/complete", put(trip_complete))
        .route("/vehicles", get(vehicles_list).post(vehicle_create))
        .route("/vehicles/:id", put(vehicle_update).delete(vehicle_delete))
        .route("/earnings", get(earnings))
        .route("/ratings", get(ratings))
}

async fn rider_actor(state: &AppState, user: &AuthenticatedUser) -> Result<Actor, AppError> {
    Ok(Actor::Rider {
        id: user.id,
        vehicle_types: state.vehicles.vehicle_types(user.id).await?,
    })
}

async fn pending_trips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<TripMatch<TripDetail>>, AppError> {
    let user = current.require_approved_rider()?;
    let vehicle_types = state.vehicles.vehicle_types(user.id).await?;
    let pending = state.trips.list_pending().await?;
    Ok(Json(match_pending_trips(&vehicle_types, &pending)))
}

async fn active_trips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<TripDetail>>, AppError> {
    let user = current.require_rider()?;
    Ok(Json(state.trips.active_for_rider(user.id).await?))
}

async fn trip_history(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<TripDetail>>, AppError> {
    let user = current.require_rider()?;
    Ok(Json(state.trips.history_for_rider(user.id).await?))
}

/// Riders see open trips and the ones assigned to them.
async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_rider()?;
    let detail = state.trips.get(trip_id).await?.ok_or(AppError::NotFound)?;
    let visible = detail.trip.status == TripStatus::Pending || detail.trip.rider_id == Some(user.id);
    if !visible {
        return Err(AppError::NotFound);
    }
    Ok(Json(detail))
}

async fn trip_accept(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_approved_rider()?;
    let actor = rider_actor(&state, user).await?;
    Ok(Json(state.trips.apply(trip_id, TripEvent::Accept, &actor).await?))
}

async fn trip_reject(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_approved_rider()?;
    let actor = rider_actor(&state, user).await?;
    Ok(Json(state.trips.apply(trip_id, TripEvent::Reject, &actor).await?))
}

#[derive(Deserialize)]
struct CompleteForm {
    distance_km: f64,
}

async fn trip_complete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    Json(form): Json<CompleteForm>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_rider()?;
    let actor = rider_actor(&state, user).await?;
    let event = TripEvent::Complete {
        distance_km: form.distance_km,
    };
    Ok(Json(state.trips.apply(trip_id, event, &actor).await?))
}

async fn vehicles_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let user = current.require_rider()?;
    Ok(Json(state.vehicles.list_for_rider(user.id).await?))
}

async fn vehicle_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<VehicleForm>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let user = current.require_rider()?;
    let vehicle = state.vehicles.create(user.id, &form).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn vehicle_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(vehicle_id): Path<i64>,
    Json(form): Json<VehicleForm>,
) -> Result<Json<Vehicle>, AppError> {
    let user = current.require_rider()?;
    Ok(Json(state.vehicles.update(user.id, vehicle_id, &form).await?))
}

async fn vehicle_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(vehicle_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user = current.require_rider()?;
    state.vehicles.delete(vehicle_id, Some(user.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct EarningsQuery {
    #[serde(default)]
    period: EarningsPeriod,
}

async fn earnings(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<EarningsQuery>,
) -> Result<Json<Earnings>, AppError> {
    let user = current.require_rider()?;
    let earnings = state
        .trips
        .earnings(user.id, query.period, Utc::now())
        .await?;
    Ok(Json(earnings))
}

async fn ratings(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<RatingSummary>, AppError> {
    let user = current.require_rider()?;
    Ok(Json(state.trips.ratings_for_rider(user.id).await?))
}
