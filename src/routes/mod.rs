pub mod admin;
pub mod public;
pub mod rider;
pub mod student;

use axum::Router;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(public::router())
        .nest("/api/students", student::router())
        .nest("/api/riders", rider::router())
        .nest("/api/admin", admin::router());
    if let Some(root) = state.config.static_root.clone() {
        router = router.fallback_service(ServeDir::new(root));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}
