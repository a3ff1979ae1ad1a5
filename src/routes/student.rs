use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    domain::{Actor, TripEvent},
    error::AppError,
    extract::{Json, Path},
    models::{
        place::Place,
        trip::{TripDetail, TripRequest},
        user::{PublicRider, UserRole},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/places", get(places))
        .route("/trips", get(trips_list).post(trip_create))
        .route("/trips/:id", get(trip_detail))
        .route("/trips/:id/cancel", put(trip_cancel))
        .route("/trips/:id/rate", put(trip_rate))
        .route("/riders/:id", get(rider_detail))
}

async fn places(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Place>>, AppError> {
    current.require_student()?;
    Ok(Json(state.places.list().await?))
}

async fn trip_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<TripRequest>,
) -> Result<(StatusCode, Json<TripDetail>), AppError> {
    let user = current.require_student()?;
    let trip = state.trips.create(user.id, &request).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<TripDetail>>, AppError> {
    let user = current.require_student()?;
    Ok(Json(state.trips.list_for_student(user.id).await?))
}

async fn own_trip(state: &AppState, student_id: i64, trip_id: i64) -> Result<TripDetail, AppError> {
    state
        .trips
        .get(trip_id)
        .await?
        .filter(|detail| detail.trip.student_id == student_id)
        .ok_or(AppError::NotFound)
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_student()?;
    Ok(Json(own_trip(&state, user.id, trip_id).await?))
}

async fn trip_cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_student()?;
    own_trip(&state, user.id, trip_id).await?;
    let actor = Actor::Student { id: user.id };
    let trip = state.trips.apply(trip_id, TripEvent::Cancel, &actor).await?;
    Ok(Json(trip))
}

#[derive(Deserialize)]
struct RatingForm {
    rating: i64,
}

async fn trip_rate(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    Json(form): Json<RatingForm>,
) -> Result<Json<TripDetail>, AppError> {
    let user = current.require_student()?;
    own_trip(&state, user.id, trip_id).await?;
    let actor = Actor::Student { id: user.id };
    let trip = state.trips.rate(trip_id, &actor, form.rating).await?;
    Ok(Json(trip))
}

async fn rider_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(rider_id): Path<i64>,
) -> Result<Json<PublicRider>, AppError> {
    current.require_student()?;
    let rider = state.users.get_with_role(rider_id, UserRole::Rider).await?;
    Ok(Json(PublicRider {
        id: rider.id,
        first_name: rider.first_name,
        last_name: rider.last_name,
        phone: rider.phone,
        rating: state.users.rider_rating(rider_id).await?,
        vehicles: state.vehicles.list_for_rider(rider_id).await?,
    }))
}
