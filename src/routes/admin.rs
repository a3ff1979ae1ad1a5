use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{self, CurrentUser},
    domain::{Actor, TripEvent},
    error::AppError,
    extract::{Json, Path, Query},
    models::{
        place::{Place, PlaceForm},
        trip::TripDetail,
        user::{AccountUpdate, Profile, RegistrationForm, RiderApproval, UserRole},
        vehicle::Vehicle,
    },
    services::reports::{build_reports, Reports},
    state::AppState,
};

const DEFAULT_TRIP_LIMIT: i64 = 50;
const MAX_TRIP_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports", get(reports))
        .route("/students", get(students_list).post(student_create))
        .route(
            "/students/:id",
            get(student_detail).put(student_update).delete(student_delete),
        )
        .route("/riders", get(riders_list).post(rider_create))
        .route(
            "/riders/:id",
            get(rider_detail).put(rider_update).delete(rider_delete),
        )
        .route("/riders/:id/approval", put(rider_approval))
        .route("/vehicles", get(vehicles_list))
        .route("/vehicles/:id", delete(vehicle_delete))
        .route("/places", get(places_list).post(place_create))
        .route("/places/:id", put(place_update).delete(place_delete))
        .route("/trips", get(trips_list))
        .route("/trips/:id/cancel", put(trip_cancel))
        .route("/users/:id/password", put(user_password))
}

async fn reports(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Reports>, AppError> {
    current.require_admin()?;
    Ok(Json(build_reports(&state.db, &state.trips).await?))
}

async fn students_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Profile>>, AppError> {
    current.require_admin()?;
    Ok(Json(state.users.profiles_by_role(UserRole::Student).await?))
}

async fn create_account(
    state: &AppState,
    admin_id: i64,
    role: UserRole,
    form: RegistrationForm,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let created = auth::register_user(state, &form.into_new_user(role)).await?;
    info!(admin_id, user_id = created.id, role = %role, "account created by administrator");
    Ok((StatusCode::CREATED, Json(state.users.profile(created.id).await?)))
}

async fn account_detail(state: &AppState, id: i64, role: UserRole) -> Result<Json<Profile>, AppError> {
    state.users.get_with_role(id, role).await?;
    Ok(Json(state.users.profile(id).await?))
}

async fn update_account(
    state: &AppState,
    id: i64,
    role: UserRole,
    update: &AccountUpdate,
) -> Result<Json<Profile>, AppError> {
    state.users.update_account(id, role, update).await?;
    Ok(Json(state.users.profile(id).await?))
}

async fn student_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let admin = current.require_admin()?;
    create_account(&state, admin.id, UserRole::Student, form).await
}

async fn student_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(student_id): Path<i64>,
) -> Result<Json<Profile>, AppError> {
    current.require_admin()?;
    account_detail(&state, student_id, UserRole::Student).await
}

async fn student_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(student_id): Path<i64>,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<Profile>, AppError> {
    current.require_admin()?;
    update_account(&state, student_id, UserRole::Student, &update).await
}

async fn student_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(student_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let admin = current.require_admin()?;
    state.users.delete(student_id, UserRole::Student).await?;
    info!(admin_id = admin.id, student_id, "student account removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn riders_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Profile>>, AppError> {
    current.require_admin()?;
    Ok(Json(state.users.profiles_by_role(UserRole::Rider).await?))
}

async fn rider_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let admin = current.require_admin()?;
    create_account(&state, admin.id, UserRole::Rider, form).await
}

async fn rider_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(rider_id): Path<i64>,
) -> Result<Json<Profile>, AppError> {
    current.require_admin()?;
    account_detail(&state, rider_id, UserRole::Rider).await
}

async fn rider_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(rider_id): Path<i64>,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<Profile>, AppError> {
    current.require_admin()?;
    update_account(&state, rider_id, UserRole::Rider, &update).await
}

#[derive(Deserialize)]
struct ApprovalForm {
    approval: RiderApproval,
}

async fn rider_approval(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(rider_id): Path<i64>,
    Json(form): Json<ApprovalForm>,
) -> Result<Json<Profile>, AppError> {
    let admin = current.require_admin()?;
    state.users.set_rider_approval(rider_id, form.approval).await?;
    info!(admin_id = admin.id, rider_id, approval = %form.approval, "rider approval changed");
    Ok(Json(state.users.profile(rider_id).await?))
}

async fn rider_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(rider_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let admin = current.require_admin()?;
    state.users.delete(rider_id, UserRole::Rider).await?;
    info!(admin_id = admin.id, rider_id, "rider account removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn vehicles_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    current.require_admin()?;
    Ok(Json(state.vehicles.list_all().await?))
}

async fn vehicle_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(vehicle_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    current.require_admin()?;
    state.vehicles.delete(vehicle_id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn places_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Place>>, AppError> {
    current.require_admin()?;
    Ok(Json(state.places.list().await?))
}

async fn place_create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<PlaceForm>,
) -> Result<(StatusCode, Json<Place>), AppError> {
    current.require_admin()?;
    let place = state.places.create(&form).await?;
    Ok((StatusCode::CREATED, Json(place)))
}

async fn place_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(place_id): Path<i64>,
    Json(form): Json<PlaceForm>,
) -> Result<Json<Place>, AppError> {
    current.require_admin()?;
    Ok(Json(state.places.update(place_id, &form).await?))
}

async fn place_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(place_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    current.require_admin()?;
    state.places.delete(place_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct TripsQuery {
    limit: Option<i64>,
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TripsQuery>,
) -> Result<Json<Vec<TripDetail>>, AppError> {
    current.require_admin()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRIP_LIMIT)
        .clamp(1, MAX_TRIP_LIMIT);
    Ok(Json(state.trips.list_recent(limit).await?))
}

async fn trip_cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripDetail>, AppError> {
    let admin = current.require_admin()?;
    let actor = Actor::Admin { id: admin.id };
    Ok(Json(state.trips.apply(trip_id, TripEvent::Cancel, &actor).await?))
}

#[derive(Deserialize)]
struct PasswordForm {
    new_password: String,
}

async fn user_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i64>,
    Json(form): Json<PasswordForm>,
) -> Result<StatusCode, AppError> {
    let admin = current.require_admin()?;
    state.users.get(user_id).await?.ok_or(AppError::NotFound)?;
    auth::reset_password(&state, user_id, &form.new_password).await?;
    info!(admin_id = admin.id, user_id, "password reset by administrator");
    Ok(StatusCode::NO_CONTENT)
}
