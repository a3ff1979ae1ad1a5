use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{self, CurrentUser},
    domain::{compute_fare, fare_tier, FareTier},
    error::AppError,
    extract::{Json, Query},
    models::user::{ContactUpdate, NewUser, Profile, RegistrationForm, UserRole},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/register/student", post(register_student))
        .route("/api/register/rider", post(register_rider))
        .route("/api/register/admin", post(register_admin))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/profile", get(profile).put(update_profile))
        .route("/api/change-password", put(change_password))
        .route("/api/fare", get(fare_quote))
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok(Json(json!({ "status": "ok", "database": "ok" })))
}

async fn register_student(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<RegistrationForm>,
) -> Result<impl IntoResponse, AppError> {
    register(state, jar, form.into_new_user(UserRole::Student)).await
}

async fn register_rider(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<RegistrationForm>,
) -> Result<impl IntoResponse, AppError> {
    register(state, jar, form.into_new_user(UserRole::Rider)).await
}

#[derive(Deserialize)]
struct AdminRegistrationForm {
    #[serde(flatten)]
    account: RegistrationForm,
    admin_key: String,
}

async fn register_admin(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<AdminRegistrationForm>,
) -> Result<impl IntoResponse, AppError> {
    auth::verify_admin_key(&state, &form.admin_key)?;
    register(state, jar, form.account.into_new_user(UserRole::Admin)).await
}

async fn register(
    state: AppState,
    jar: PrivateCookieJar,
    new_user: NewUser,
) -> Result<(PrivateCookieJar, (StatusCode, Json<Profile>)), AppError> {
    let user = auth::register_user(&state, &new_user).await?;
    let session_id = auth::create_session(&state, user.id).await?;
    let profile = state.users.profile(user.id).await?;
    Ok((
        auth::apply_session_cookie(jar, &session_id),
        (StatusCode::CREATED, Json(profile)),
    ))
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
    /// The portal the user logged in from; a mismatch is treated as bad credentials.
    role: Option<UserRole>,
}

async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(PrivateCookieJar, Json<Profile>), AppError> {
    let user = auth::authenticate_user(&state, &form.email, &form.password).await?;
    if form.role.is_some_and(|role| role != user.role) {
        return Err(AppError::Unauthorized);
    }
    let session_id = auth::create_session(&state, user.id).await?;
    let profile = state.users.profile(user.id).await?;
    Ok((auth::apply_session_cookie(jar, &session_id), Json(profile)))
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, StatusCode), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    Ok((auth::clear_session_cookie(jar), StatusCode::NO_CONTENT))
}

async fn profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Profile>, AppError> {
    let user = current.require_user()?;
    Ok(Json(state.users.profile(user.id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(update): Json<ContactUpdate>,
) -> Result<Json<Profile>, AppError> {
    let user = current.require_user()?;
    state.users.update_contact(user.id, &update).await?;
    Ok(Json(state.users.profile(user.id).await?))
}

#[derive(Deserialize)]
struct ChangePasswordForm {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<ChangePasswordForm>,
) -> Result<StatusCode, AppError> {
    let user = current.require_user()?;
    auth::change_password(&state, user.id, &form.current_password, &form.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct FareQuery {
    distance_km: f64,
}

#[derive(Serialize)]
struct FareQuote {
    distance_km: f64,
    fare: Option<i64>,
    tier: Option<FareTier>,
}

async fn fare_quote(Query(query): Query<FareQuery>) -> Json<FareQuote> {
    Json(FareQuote {
        distance_km: query.distance_km,
        fare: compute_fare(query.distance_km),
        tier: fare_tier(query.distance_km),
    })
}
