use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Motorcycle,
    Car,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Car => "car",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "motorcycle" => Ok(VehicleType::Motorcycle),
            "car" => Ok(VehicleType::Car),
            other => Err(ParseEnumError::new("vehicle type", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub rider_id: i64,
    pub vehicle_type: VehicleType,
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VehicleRow {
    pub id: i64,
    pub rider_id: i64,
    pub vehicle_type: String,
    pub plate: String,
    pub brand: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = ParseEnumError;

    fn try_from(row: VehicleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            rider_id: row.rider_id,
            vehicle_type: row.vehicle_type.parse()?,
            plate: row.plate,
            brand: row.brand,
            model: row.model,
            created_at: row.created_at,
        })
    }
}

/// Descriptive fields a rider submits when registering or editing a vehicle.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleForm {
    pub vehicle_type: VehicleType,
    pub plate: String,
    pub brand: String,
    pub model: String,
}
