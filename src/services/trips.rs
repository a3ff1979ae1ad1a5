use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    db::DbPool,
    domain::{apply_transition, check_rating, Actor, RatingRefusal, TripError, TripEvent},
    error::AppError,
    models::trip::{Trip, TripDetail, TripRequest, TripRow, TripStatus},
};

const TRIP_SELECT: &str = r#"
    SELECT t.id, t.student_id, t.rider_id, t.status, t.required_vehicle_type,
           t.pickup_place_id, t.destination_place_id, t.scheduled_at, t.is_round_trip,
           t.note, t.distance_km, t.fare, t.rating, t.created_at, t.updated_at, t.completed_at,
           pickup.name AS pickup_name,
           destination.name AS destination_name,
           s.first_name || ' ' || s.last_name AS student_name,
           s.phone AS student_phone,
           r.first_name || ' ' || r.last_name AS rider_name,
           r.phone AS rider_phone
    FROM trips t
    JOIN places pickup ON pickup.id = t.pickup_place_id
    JOIN places destination ON destination.id = t.destination_place_id
    JOIN users s ON s.id = t.student_id
    LEFT JOIN users r ON r.id = t.rider_id"#;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EarningsPeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
    All,
}

impl EarningsPeriod {
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            EarningsPeriod::Daily => Some(now - Duration::days(1)),
            EarningsPeriod::Weekly => Some(now - Duration::days(7)),
            EarningsPeriod::Monthly => Some(now - Duration::days(30)),
            EarningsPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Earnings {
    pub period: EarningsPeriod,
    pub since: Option<DateTime<Utc>>,
    pub completed_trips: usize,
    pub total_fare: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatedTrip {
    pub trip_id: i64,
    pub rating: u8,
    pub student_name: String,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: usize,
    pub ratings: Vec<RatedTrip>,
}

#[derive(Clone)]
pub struct TripStore {
    db: DbPool,
}

impl TripStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Records a new request in `pending`.
    pub async fn create(&self, student_id: i64, request: &TripRequest) -> Result<TripDetail, AppError> {
        if request.pickup_place_id == request.destination_place_id {
            return Err(AppError::BadRequest(
                "pickup and destination must differ".into(),
            ));
        }
        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM places WHERE id IN (?1, ?2)")
            .bind(request.pickup_place_id)
            .bind(request.destination_place_id)
            .fetch_one(&self.db)
            .await?;
        if known != 2 {
            return Err(AppError::BadRequest("unknown pickup or destination".into()));
        }

        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty());
        let now = Utc::now();
        let id = sqlx::query(
            r#"INSERT INTO trips (student_id, status, required_vehicle_type, pickup_place_id,
                   destination_place_id, scheduled_at, is_round_trip, note, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"#,
        )
        .bind(student_id)
        .bind(TripStatus::Pending.as_str())
        .bind(request.required_vehicle_type.as_str())
        .bind(request.pickup_place_id)
        .bind(request.destination_place_id)
        .bind(request.scheduled_at)
        .bind(request.is_round_trip)
        .bind(note)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();
        info!(trip_id = id, student_id, vehicle_type = %request.required_vehicle_type, "trip requested");

        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn get(&self, id: i64) -> Result<Option<TripDetail>, AppError> {
        let row = sqlx::query_as::<_, TripRow>(&format!("{TRIP_SELECT} WHERE t.id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(TripDetail::try_from)
            .transpose()
            .map_err(|err| AppError::Other(err.into()))
    }

    /// The open pool, oldest scheduled first.
    pub async fn list_pending(&self) -> Result<Vec<TripDetail>, AppError> {
        self.fetch(
            "WHERE t.status = 'pending' ORDER BY t.scheduled_at, t.id",
            None,
        )
        .await
    }

    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<TripDetail>, AppError> {
        self.fetch(
            "WHERE t.student_id = ?1 ORDER BY t.created_at DESC, t.id DESC",
            Some(student_id),
        )
        .await
    }

    pub async fn active_for_rider(&self, rider_id: i64) -> Result<Vec<TripDetail>, AppError> {
        self.fetch(
            "WHERE t.rider_id = ?1 AND t.status = 'accepted' ORDER BY t.scheduled_at, t.id",
            Some(rider_id),
        )
        .await
    }

    pub async fn history_for_rider(&self, rider_id: i64) -> Result<Vec<TripDetail>, AppError> {
        self.fetch(
            "WHERE t.rider_id = ?1 AND t.status = 'completed' ORDER BY t.completed_at DESC, t.id DESC",
            Some(rider_id),
        )
        .await
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<TripDetail>, AppError> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "{TRIP_SELECT} ORDER BY t.created_at DESC, t.id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        into_details(rows)
    }

    async fn fetch(&self, clause: &str, param: Option<i64>) -> Result<Vec<TripDetail>, AppError> {
        let sql = format!("{TRIP_SELECT} {clause}");
        let mut query = sqlx::query_as::<_, TripRow>(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }
        let rows = query.fetch_all(&self.db).await?;
        into_details(rows)
    }

    /// Runs the transition guard and persists its result with a single
    /// conditional update on the previous `status`/`rider_id` pair.
    pub async fn apply(
        &self,
        trip_id: i64,
        event: TripEvent,
        actor: &Actor,
    ) -> Result<TripDetail, AppError> {
        let current = self.get(trip_id).await?.ok_or(AppError::NotFound)?;
        let next = match apply_transition(&current.trip, &event, actor) {
            Ok(next) => next,
            Err(_) if taken_by_other(&current.trip, &event, actor) => {
                warn!(trip_id, rider_id = actor.id(), "trip already taken by another rider");
                return Err(TripError::ConcurrentAcceptConflict { trip_id }.into());
            }
            Err(err) => return Err(err.into()),
        };

        let now = Utc::now();
        let completed_at = (next.status == TripStatus::Completed).then_some(now);
        let result = sqlx::query(
            r#"UPDATE trips
               SET status = ?1, rider_id = ?2, distance_km = ?3, fare = ?4,
                   completed_at = COALESCE(?5, completed_at), updated_at = ?6
               WHERE id = ?7 AND status = ?8 AND rider_id IS ?9"#,
        )
        .bind(next.status.as_str())
        .bind(next.rider_id)
        .bind(next.distance_km)
        .bind(next.fare)
        .bind(completed_at)
        .bind(now)
        .bind(trip_id)
        .bind(current.trip.status.as_str())
        .bind(current.trip.rider_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.lost_race(trip_id, &event, actor).await);
        }

        info!(
            trip_id,
            actor = %actor.role(),
            actor_id = actor.id(),
            event = %event.kind(),
            from = %current.trip.status,
            to = %next.status,
            "trip transitioned"
        );
        self.get(trip_id).await?.ok_or(AppError::NotFound)
    }

    /// Explains why a conditional update matched no row.
    async fn lost_race(&self, trip_id: i64, event: &TripEvent, actor: &Actor) -> AppError {
        let fresh = match self.get(trip_id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => return AppError::NotFound,
            Err(err) => return err,
        };
        if taken_by_other(&fresh.trip, event, actor) {
            warn!(trip_id, rider_id = actor.id(), "accept lost the race for trip");
        }
        race_error(&fresh.trip, event, actor)
    }

    pub async fn rate(&self, trip_id: i64, actor: &Actor, rating: i64) -> Result<TripDetail, AppError> {
        let current = self.get(trip_id).await?.ok_or(AppError::NotFound)?;
        let next = check_rating(&current.trip, actor, rating)?;

        let result = sqlx::query(
            r#"UPDATE trips SET rating = ?1, updated_at = ?2
               WHERE id = ?3 AND status = 'completed' AND rating IS NULL"#,
        )
        .bind(next.rating.map(i64::from))
        .bind(Utc::now())
        .bind(trip_id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(TripError::InvalidRating {
                reason: RatingRefusal::AlreadyRated,
            }
            .into());
        }

        info!(trip_id, rating, "trip rated");
        self.get(trip_id).await?.ok_or(AppError::NotFound)
    }

    pub async fn earnings(
        &self,
        rider_id: i64,
        period: EarningsPeriod,
        now: DateTime<Utc>,
    ) -> Result<Earnings, AppError> {
        let since = period.since(now);
        let history = self.history_for_rider(rider_id).await?;
        let in_period: Vec<_> = history
            .iter()
            .filter(|detail| match (since, detail.trip.completed_at) {
                (None, _) => true,
                (Some(since), Some(done)) => done >= since,
                (Some(_), None) => false,
            })
            .collect();
        Ok(Earnings {
            period,
            since,
            completed_trips: in_period.len(),
            total_fare: in_period.iter().filter_map(|detail| detail.trip.fare).sum(),
        })
    }

    pub async fn ratings_for_rider(&self, rider_id: i64) -> Result<RatingSummary, AppError> {
        let ratings: Vec<RatedTrip> = self
            .history_for_rider(rider_id)
            .await?
            .into_iter()
            .filter_map(|detail| {
                detail.trip.rating.map(|rating| RatedTrip {
                    trip_id: detail.trip.id,
                    rating,
                    student_name: detail.student_name,
                    completed_at: detail.trip.completed_at,
                })
            })
            .collect();
        let average = (!ratings.is_empty()).then(|| {
            ratings.iter().map(|r| f64::from(r.rating)).sum::<f64>() / ratings.len() as f64
        });
        Ok(RatingSummary {
            average,
            count: ratings.len(),
            ratings,
        })
    }
}

/// An accept aimed at a trip another rider already holds.
fn taken_by_other(trip: &Trip, event: &TripEvent, actor: &Actor) -> bool {
    matches!(event, TripEvent::Accept)
        && trip.status == TripStatus::Accepted
        && trip.rider_id.is_some_and(|winner| winner != actor.id())
}

/// The error for a transition whose update found the row already changed,
/// judged against the row as it is now.
fn race_error(fresh: &Trip, event: &TripEvent, actor: &Actor) -> AppError {
    if taken_by_other(fresh, event, actor) {
        return TripError::ConcurrentAcceptConflict { trip_id: fresh.id }.into();
    }
    match apply_transition(fresh, event, actor) {
        Err(err) => err.into(),
        Ok(_) => AppError::Conflict(
            "trip changed while the request was processed, please retry".into(),
        ),
    }
}

fn into_details(rows: Vec<TripRow>) -> Result<Vec<TripDetail>, AppError> {
    rows.into_iter()
        .map(|row| TripDetail::try_from(row).map_err(|err| AppError::Other(err.into())))
        .collect()
}
