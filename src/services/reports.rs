use serde::Serialize;

use crate::{db::DbPool, error::AppError, models::trip::TripDetail, services::trips::TripStore};

const RECENT_TRIPS: i64 = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reports {
    pub total_students: i64,
    pub total_riders: i64,
    pub pending_riders: i64,
    pub total_places: i64,
    /// Trips still in play: pending or accepted.
    pub active_trips: i64,
    pub completed_trips: i64,
    pub cancelled_trips: i64,
    pub rejected_trips: i64,
    pub total_fares: i64,
    pub recent_trips: Vec<TripDetail>,
}

pub async fn build_reports(db: &DbPool, trips: &TripStore) -> Result<Reports, AppError> {
    let count_role = |role: &'static str| {
        sqlx::query_scalar::<sqlx::Sqlite, i64>("SELECT COUNT(*) FROM users WHERE role = ?1")
            .bind(role)
    };
    let total_students = count_role("student").fetch_one(db).await?;
    let total_riders = count_role("rider").fetch_one(db).await?;
    let pending_riders: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE role = 'rider' AND approval = 'pending'",
    )
    .fetch_one(db)
    .await?;
    let total_places: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM places")
        .fetch_one(db)
        .await?;

    let by_status: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM trips GROUP BY status")
            .fetch_all(db)
            .await?;
    let count_status = |wanted: &[&str]| -> i64 {
        by_status
            .iter()
            .filter(|(status, _)| wanted.contains(&status.as_str()))
            .map(|(_, count)| count)
            .sum()
    };

    let total_fares: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(fare), 0) FROM trips WHERE status = 'completed'")
            .fetch_one(db)
            .await?;

    Ok(Reports {
        total_students,
        total_riders,
        pending_riders,
        total_places,
        active_trips: count_status(&["pending", "accepted"]),
        completed_trips: count_status(&["completed"]),
        cancelled_trips: count_status(&["cancelled"]),
        rejected_trips: count_status(&["rejected"]),
        total_fares,
        recent_trips: trips.list_recent(RECENT_TRIPS).await?,
    })
}
