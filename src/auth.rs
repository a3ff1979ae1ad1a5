use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        session::Session,
        user::{NewUser, RiderApproval, User, UserRole},
    },
    state::AppState,
};

pub const SESSION_COOKIE: &str = "campus_ride_session";
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    /// Only riders carry an approval state.
    pub approval: Option<RiderApproval>,
}

impl TryFrom<&User> for AuthenticatedUser {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        Ok(Self {
            id: user.id,
            uuid: user.uuid.clone(),
            email: user.email.clone(),
            display_name: user.display_name(),
            role: user.role().map_err(|err| AppError::Other(err.into()))?,
            approval: user.approval().map_err(|err| AppError::Other(err.into()))?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let jar = match PrivateCookieJar::<Key>::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let user = load_session_user(state, cookie.value()).await?;
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn require_role(&self, role: UserRole) -> Result<&AuthenticatedUser, AppError> {
        let user = self.require_user()?;
        if user.role == role {
            Ok(user)
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_student(&self) -> Result<&AuthenticatedUser, AppError> {
        self.require_role(UserRole::Student)
    }

    pub fn require_rider(&self) -> Result<&AuthenticatedUser, AppError> {
        self.require_role(UserRole::Rider)
    }

    /// A rider an administrator has cleared for trip work.
    pub fn require_approved_rider(&self) -> Result<&AuthenticatedUser, AppError> {
        let user = self.require_rider()?;
        if user.approval == Some(RiderApproval::Approved) {
            Ok(user)
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> Result<&AuthenticatedUser, AppError> {
        self.require_role(UserRole::Admin)
    }
}

async fn load_session_user(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, user_id, created_at, last_seen_at, expires_at FROM sessions WHERE id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(session) = session else {
        return Ok(None);
    };

    let now = Utc::now();
    if session.is_expired(now) {
        debug!(user_id = session.user_id, "session expired");
        destroy_session(state, &session.id).await?;
        return Ok(None);
    }
    sqlx::query("UPDATE sessions SET last_seen_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(&session.id)
        .execute(&state.db)
        .await?;

    let Some(user) = state.users.get(session.user_id).await? else {
        return Ok(None);
    };
    Ok(Some(AuthenticatedUser::try_from(&user)?))
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|err| AppError::Other(anyhow::anyhow!("stored password hash unreadable: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_new_user(user: &NewUser) -> Result<(), AppError> {
    let email = user.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(AppError::BadRequest("a valid email address is required".into()));
    }
    if user.first_name.trim().is_empty() || user.last_name.trim().is_empty() {
        return Err(AppError::BadRequest("first and last name are required".into()));
    }
    validate_password(&user.password)?;
    match user.role {
        UserRole::Student if user.student_code.as_deref().map_or(true, |c| c.trim().is_empty()) => {
            Err(AppError::BadRequest("student code is required".into()))
        }
        UserRole::Rider if user.licence_no.as_deref().map_or(true, |l| l.trim().is_empty()) => {
            Err(AppError::BadRequest("driving licence number is required".into()))
        }
        _ => Ok(()),
    }
}

pub async fn register_user(state: &AppState, user: &NewUser) -> Result<AuthenticatedUser, AppError> {
    validate_new_user(user)?;
    let password_hash = hash_password(&user.password)?;
    let created = state.users.create(user, &password_hash).await?;
    info!(user_id = created.id, role = %user.role, "account registered");
    AuthenticatedUser::try_from(&created)
}

/// Checks credentials. Unknown emails and wrong passwords look the same.
pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let Some(user) = state.users.find_by_email(email).await? else {
        return Err(AppError::Unauthorized);
    };
    if !verify_password(password, &user.password_hash)? {
        debug!(user_id = user.id, "password mismatch");
        return Err(AppError::Unauthorized);
    }
    state.users.touch_login(user.id).await?;
    AuthenticatedUser::try_from(&user)
}

/// Gate for administrator sign-up. Without a configured key nobody passes.
pub fn verify_admin_key(state: &AppState, presented: &str) -> Result<(), AppError> {
    let Some(expected) = state.config.admin_key.as_deref() else {
        warn!("admin registration attempted but ADMIN_KEY is not set");
        return Err(AppError::Forbidden);
    };
    if Sha256::digest(presented.as_bytes()) != Sha256::digest(expected.as_bytes()) {
        warn!("admin registration with a wrong key");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    current_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let user = state.users.get(user_id).await?.ok_or(AppError::NotFound)?;
    if !verify_password(current_password, &user.password_hash)? {
        return Err(AppError::BadRequest("current password is incorrect".into()));
    }
    reset_password(state, user_id, new_password).await
}

/// Sets a new password and ends every session of the account.
pub async fn reset_password(state: &AppState, user_id: i64, new_password: &str) -> Result<(), AppError> {
    validate_password(new_password)?;
    let password_hash = hash_password(new_password)?;
    state.users.set_password_hash(user_id, &password_hash).await?;
    info!(user_id, "password changed");
    Ok(())
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
        .bind(now)
        .execute(&state.db)
        .await?
        .rows_affected();
    if purged > 0 {
        debug!(purged, "expired sessions removed");
    }
    sqlx::query(
        "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at) VALUES (?1, ?2, ?3, ?3, ?4)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(now + state.config.session_ttl)
    .execute(&state.db)
    .await?;
    debug!(user_id, "session created");
    Ok(session_id)
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
