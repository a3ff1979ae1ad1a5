use std::{env, net::SocketAddr, path::PathBuf};

use chrono::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    pub session_ttl: Duration,
    /// Directory holding the built SPA, served for every non-API path.
    pub static_root: Option<PathBuf>,
    /// Shared secret for administrator sign-up. Unset disables the route.
    pub admin_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://campus_ride.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-campus-ride-cookie-secret".to_string());

        let session_ttl_hours: i64 = env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SESSION_TTL_HOURS: {err}")))?;
        if session_ttl_hours <= 0 {
            return Err(AppError::Config(
                "SESSION_TTL_HOURS must be positive".to_string(),
            ));
        }

        let static_root = env::var("STATIC_ROOT").ok().map(PathBuf::from);
        let admin_key = env::var("ADMIN_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            session_ttl: Duration::hours(session_ttl_hours),
            static_root,
            admin_key,
        })
    }
}
