use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

use super::{vehicle::VehicleType, ParseEnumError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
    Rejected,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Accepted => "accepted",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
            TripStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TripStatus::Completed | TripStatus::Cancelled | TripStatus::Rejected
        )
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TripStatus::Pending),
            "accepted" => Ok(TripStatus::Accepted),
            "completed" => Ok(TripStatus::Completed),
            "cancelled" => Ok(TripStatus::Cancelled),
            "rejected" => Ok(TripStatus::Rejected),
            other => Err(ParseEnumError::new("trip status", other)),
        }
    }
}

/// A single ride request from a student.
///
/// `fare` is present exactly when the trip is completed, and `rider_id`
/// exactly when it is accepted or completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: i64,
    pub student_id: i64,
    pub rider_id: Option<i64>,
    pub status: TripStatus,
    pub required_vehicle_type: VehicleType,
    pub pickup_place_id: i64,
    pub destination_place_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub is_round_trip: bool,
    pub note: Option<String>,
    pub distance_km: Option<f64>,
    pub fare: Option<i64>,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A trip together with the names the client shows next to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripDetail {
    #[serde(flatten)]
    pub trip: Trip,
    pub pickup_name: String,
    pub destination_name: String,
    pub student_name: String,
    pub student_phone: Option<String>,
    pub rider_name: Option<String>,
    pub rider_phone: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub id: i64,
    pub student_id: i64,
    pub rider_id: Option<i64>,
    pub status: String,
    pub required_vehicle_type: String,
    pub pickup_place_id: i64,
    pub destination_place_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub is_round_trip: bool,
    pub note: Option<String>,
    pub distance_km: Option<f64>,
    pub fare: Option<i64>,
    pub rating: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pickup_name: String,
    pub destination_name: String,
    pub student_name: String,
    pub student_phone: Option<String>,
    pub rider_name: Option<String>,
    pub rider_phone: Option<String>,
}

impl TryFrom<TripRow> for TripDetail {
    type Error = ParseEnumError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let rating = row
            .rating
            .map(|value| {
                u8::try_from(value).map_err(|_| ParseEnumError::new("rating", value.to_string()))
            })
            .transpose()?;
        Ok(Self {
            trip: Trip {
                id: row.id,
                student_id: row.student_id,
                rider_id: row.rider_id,
                status: row.status.parse()?,
                required_vehicle_type: row.required_vehicle_type.parse()?,
                pickup_place_id: row.pickup_place_id,
                destination_place_id: row.destination_place_id,
                scheduled_at: row.scheduled_at,
                is_round_trip: row.is_round_trip,
                note: row.note,
                distance_km: row.distance_km,
                fare: row.fare,
                rating,
                created_at: row.created_at,
                updated_at: row.updated_at,
                completed_at: row.completed_at,
            },
            pickup_name: row.pickup_name,
            destination_name: row.destination_name,
            student_name: row.student_name,
            student_phone: row.student_phone,
            rider_name: row.rider_name,
            rider_phone: row.rider_phone,
        })
    }
}

/// What a student submits to request a ride.
#[derive(Debug, Clone, Deserialize)]
pub struct TripRequest {
    pub pickup_place_id: i64,
    pub destination_place_id: i64,
    pub required_vehicle_type: VehicleType,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub is_round_trip: bool,
    pub note: Option<String>,
}
