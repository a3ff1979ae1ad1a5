//! Trip matching and pricing rules.
//!
//! Everything in here is synchronous and free of I/O. The persistence layer
//! in [`crate::services::trips`] calls into these functions and is the only
//! place that writes their results back.

pub mod fare;
pub mod matching;
pub mod transition;

use std::{collections::BTreeSet, fmt};

use serde::Serialize;
use thiserror::Error;

use crate::models::{trip::TripStatus, user::UserRole, vehicle::VehicleType};

pub use fare::{compute_fare, fare_tier, FareTier};
pub use matching::{filter_trips_for_rider, match_pending_trips, RequiresVehicle, TripMatch};
pub use transition::{apply_transition, check_rating};

/// Who is asking for a trip to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Student {
        id: i64,
    },
    Rider {
        id: i64,
        /// Vehicle types across the rider's registered vehicles.
        vehicle_types: BTreeSet<VehicleType>,
    },
    Admin {
        id: i64,
    },
}

impl Actor {
    pub fn role(&self) -> UserRole {
        match self {
            Actor::Student { .. } => UserRole::Student,
            Actor::Rider { .. } => UserRole::Rider,
            Actor::Admin { .. } => UserRole::Admin,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Actor::Student { id } | Actor::Rider { id, .. } | Actor::Admin { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TripEvent {
    Accept,
    Reject,
    Cancel,
    Complete { distance_km: f64 },
}

impl TripEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TripEvent::Accept => EventKind::Accept,
            TripEvent::Reject => EventKind::Reject,
            TripEvent::Cancel => EventKind::Cancel,
            TripEvent::Complete { .. } => EventKind::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Accept,
    Reject,
    Cancel,
    Complete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Accept => "accept",
            EventKind::Reject => "reject",
            EventKind::Cancel => "cancel",
            EventKind::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Why the transition guard turned a request down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("the trip is already finished")]
    TerminalState,
    #[error("this event does not apply to the current status")]
    NotAllowedFromState,
    #[error("a {0} may not do this")]
    RoleNotPermitted(UserRole),
    #[error("the rider has no {0} registered")]
    VehicleTypeNotOwned(VehicleType),
    #[error("the trip is already assigned to a rider")]
    AlreadyAssigned,
    #[error("only the assigned rider may do this")]
    NotAssignedRider,
    #[error("only the student who requested the trip may do this")]
    NotRequestingStudent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RatingRefusal {
    #[error("rating must be between 1 and 5 (got {0})")]
    OutOfRange(i64),
    #[error("only completed trips can be rated (trip is {0})")]
    NotCompleted(TripStatus),
    #[error("the trip has already been rated")]
    AlreadyRated,
    #[error("only the student who requested the trip may rate it")]
    NotRequestingStudent,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TripError {
    #[error("distance must be greater than zero (got {distance_km} km)")]
    InvalidDistance { distance_km: f64 },
    #[error("cannot {event} a {from} trip: {reason}")]
    InvalidStateTransition {
        from: TripStatus,
        event: EventKind,
        reason: Refusal,
    },
    #[error("trip {trip_id} was already taken by another rider")]
    ConcurrentAcceptConflict { trip_id: i64 },
    #[error("rating rejected: {reason}")]
    InvalidRating { reason: RatingRefusal },
}

impl TripError {
    pub fn kind(&self) -> &'static str {
        match self {
            TripError::InvalidDistance { .. } => "invalid_distance",
            TripError::InvalidStateTransition { .. } => "invalid_state_transition",
            TripError::ConcurrentAcceptConflict { .. } => "concurrent_accept_conflict",
            TripError::InvalidRating { .. } => "invalid_rating",
        }
    }
}
