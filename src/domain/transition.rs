use crate::models::trip::{Trip, TripStatus};

use super::{compute_fare, Actor, RatingRefusal, Refusal, TripError, TripEvent};

/// Decides whether `actor` may apply `event` to `trip` and returns the trip
/// as it should look afterwards. The input is never modified; persisting the
/// result is the caller's job.
pub fn apply_transition(trip: &Trip, event: &TripEvent, actor: &Actor) -> Result<Trip, TripError> {
    let refuse = |reason: Refusal| TripError::InvalidStateTransition {
        from: trip.status,
        event: event.kind(),
        reason,
    };

    if trip.status.is_terminal() {
        return Err(refuse(Refusal::TerminalState));
    }

    let mut next = trip.clone();
    match (trip.status, event) {
        (TripStatus::Pending, TripEvent::Accept) | (TripStatus::Pending, TripEvent::Reject) => {
            let Actor::Rider { id, vehicle_types } = actor else {
                return Err(refuse(Refusal::RoleNotPermitted(actor.role())));
            };
            if trip.rider_id.is_some() {
                return Err(refuse(Refusal::AlreadyAssigned));
            }
            if !vehicle_types.contains(&trip.required_vehicle_type) {
                return Err(refuse(Refusal::VehicleTypeNotOwned(
                    trip.required_vehicle_type,
                )));
            }
            if matches!(event, TripEvent::Accept) {
                next.status = TripStatus::Accepted;
                next.rider_id = Some(*id);
            } else {
                next.status = TripStatus::Rejected;
            }
        }
        (TripStatus::Pending, TripEvent::Cancel) => {
            let Actor::Student { id } = actor else {
                return Err(refuse(Refusal::RoleNotPermitted(actor.role())));
            };
            if *id != trip.student_id {
                return Err(refuse(Refusal::NotRequestingStudent));
            }
            if trip.rider_id.is_some() {
                return Err(refuse(Refusal::AlreadyAssigned));
            }
            next.status = TripStatus::Cancelled;
        }
        (TripStatus::Accepted, TripEvent::Complete { distance_km }) => {
            let Actor::Rider { id, .. } = actor else {
                return Err(refuse(Refusal::RoleNotPermitted(actor.role())));
            };
            if trip.rider_id != Some(*id) {
                return Err(refuse(Refusal::NotAssignedRider));
            }
            let fare = compute_fare(*distance_km).ok_or(TripError::InvalidDistance {
                distance_km: *distance_km,
            })?;
            next.status = TripStatus::Completed;
            next.distance_km = Some(*distance_km);
            next.fare = Some(fare);
        }
        (TripStatus::Accepted, TripEvent::Cancel) => {
            match actor {
                Actor::Student { id } if *id != trip.student_id => {
                    return Err(refuse(Refusal::NotRequestingStudent));
                }
                Actor::Student { .. } | Actor::Admin { .. } => {}
                Actor::Rider { .. } => {
                    return Err(refuse(Refusal::RoleNotPermitted(actor.role())));
                }
            }
            next.status = TripStatus::Cancelled;
            next.rider_id = None;
        }
        _ => return Err(refuse(Refusal::NotAllowedFromState)),
    }

    Ok(next)
}

/// Validates a student's rating of a finished trip and returns the rated trip.
pub fn check_rating(trip: &Trip, actor: &Actor, rating: i64) -> Result<Trip, TripError> {
    let refuse = |reason: RatingRefusal| TripError::InvalidRating { reason };

    match actor {
        Actor::Student { id } if *id == trip.student_id => {}
        _ => return Err(refuse(RatingRefusal::NotRequestingStudent)),
    }
    if trip.status != TripStatus::Completed {
        return Err(refuse(RatingRefusal::NotCompleted(trip.status)));
    }
    if trip.rating.is_some() {
        return Err(refuse(RatingRefusal::AlreadyRated));
    }
    let value = u8::try_from(rating)
        .ok()
        .filter(|value| (1..=5).contains(value))
        .ok_or_else(|| refuse(RatingRefusal::OutOfRange(rating)))?;

    let mut next = trip.clone();
    next.rating = Some(value);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::{
        domain::EventKind,
        models::{user::UserRole, vehicle::VehicleType},
    };

    const STUDENT: i64 = 10;
    const RIDER: i64 = 20;
    const OTHER_RIDER: i64 = 21;

    fn pending(vehicle_type: VehicleType) -> Trip {
        let now = Utc::now();
        Trip {
            id: 1,
            student_id: STUDENT,
            rider_id: None,
            status: TripStatus::Pending,
            required_vehicle_type: vehicle_type,
            pickup_place_id: 1,
            destination_place_id: 2,
            scheduled_at: now,
            is_round_trip: false,
            note: None,
            distance_km: None,
            fare: None,
            rating: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn rider(id: i64, types: &[VehicleType]) -> Actor {
        Actor::Rider {
            id,
            vehicle_types: types.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn student(id: i64) -> Actor {
        Actor::Student { id }
    }

    fn accepted_by_rider() -> Trip {
        apply_transition(
            &pending(VehicleType::Motorcycle),
            &TripEvent::Accept,
            &rider(RIDER, &[VehicleType::Motorcycle]),
        )
        .expect("accept")
    }

    fn completed(distance_km: f64) -> Trip {
        apply_transition(
            &accepted_by_rider(),
            &TripEvent::Complete { distance_km },
            &rider(RIDER, &[VehicleType::Motorcycle]),
        )
        .expect("complete")
    }

    fn refusal(result: Result<Trip, TripError>) -> Refusal {
        match result {
            Err(TripError::InvalidStateTransition { reason, .. }) => reason,
            other => panic!("expected a refused transition, got {other:?}"),
        }
    }

    #[test]
    fn rider_with_matching_vehicle_accepts() {
        let trip = accepted_by_rider();
        assert_eq!(trip.status, TripStatus::Accepted);
        assert_eq!(trip.rider_id, Some(RIDER));
        assert_eq!(trip.fare, None);
    }

    #[test]
    fn accept_requires_owned_vehicle_type() {
        let result = apply_transition(
            &pending(VehicleType::Car),
            &TripEvent::Accept,
            &rider(RIDER, &[VehicleType::Motorcycle]),
        );
        assert_eq!(
            refusal(result),
            Refusal::VehicleTypeNotOwned(VehicleType::Car)
        );
    }

    #[test]
    fn students_cannot_accept() {
        let result = apply_transition(
            &pending(VehicleType::Car),
            &TripEvent::Accept,
            &student(STUDENT),
        );
        assert_eq!(
            refusal(result),
            Refusal::RoleNotPermitted(UserRole::Student)
        );
    }

    #[test]
    fn second_accept_is_refused() {
        let result = apply_transition(
            &accepted_by_rider(),
            &TripEvent::Accept,
            &rider(OTHER_RIDER, &[VehicleType::Motorcycle]),
        );
        assert_eq!(refusal(result), Refusal::NotAllowedFromState);
    }

    #[test]
    fn reject_leaves_trip_unassigned() {
        let trip = apply_transition(
            &pending(VehicleType::Motorcycle),
            &TripEvent::Reject,
            &rider(RIDER, &[VehicleType::Motorcycle]),
        )
        .expect("reject");
        assert_eq!(trip.status, TripStatus::Rejected);
        assert_eq!(trip.rider_id, None);
    }

    #[test]
    fn requesting_student_cancels_pending_trip() {
        let trip = apply_transition(
            &pending(VehicleType::Car),
            &TripEvent::Cancel,
            &student(STUDENT),
        )
        .expect("cancel");
        assert_eq!(trip.status, TripStatus::Cancelled);

        let result = apply_transition(
            &pending(VehicleType::Car),
            &TripEvent::Cancel,
            &student(STUDENT + 1),
        );
        assert_eq!(refusal(result), Refusal::NotRequestingStudent);
    }

    #[test]
    fn admin_cannot_cancel_pending_but_can_cancel_accepted() {
        let admin = Actor::Admin { id: 99 };
        let result = apply_transition(&pending(VehicleType::Car), &TripEvent::Cancel, &admin);
        assert_eq!(refusal(result), Refusal::RoleNotPermitted(UserRole::Admin));

        let trip = apply_transition(&accepted_by_rider(), &TripEvent::Cancel, &admin)
            .expect("admin cancel");
        assert_eq!(trip.status, TripStatus::Cancelled);
        assert_eq!(trip.rider_id, None);
    }

    #[test]
    fn requesting_student_cancels_accepted_trip_and_frees_the_rider() {
        let trip = apply_transition(&accepted_by_rider(), &TripEvent::Cancel, &student(STUDENT))
            .expect("cancel");
        assert_eq!(trip.status, TripStatus::Cancelled);
        assert_eq!(trip.rider_id, None);
    }

    #[test]
    fn other_student_cannot_cancel_accepted_trip() {
        let result = apply_transition(
            &accepted_by_rider(),
            &TripEvent::Cancel,
            &student(STUDENT + 1),
        );
        assert_eq!(refusal(result), Refusal::NotRequestingStudent);
    }

    #[test]
    fn reject_requires_owned_vehicle_type() {
        let result = apply_transition(
            &pending(VehicleType::Car),
            &TripEvent::Reject,
            &rider(RIDER, &[VehicleType::Motorcycle]),
        );
        assert_eq!(refusal(result), Refusal::VehicleTypeNotOwned(VehicleType::Car));
    }

    #[test]
    fn only_riders_complete() {
        for (actor, role) in [
            (Actor::Admin { id: 99 }, UserRole::Admin),
            (student(STUDENT), UserRole::Student),
        ] {
            let result = apply_transition(
                &accepted_by_rider(),
                &TripEvent::Complete { distance_km: 5.0 },
                &actor,
            );
            assert_eq!(refusal(result), Refusal::RoleNotPermitted(role));
        }
    }

    #[test]
    fn assigned_rider_cannot_cancel() {
        let result = apply_transition(
            &accepted_by_rider(),
            &TripEvent::Cancel,
            &rider(RIDER, &[VehicleType::Motorcycle]),
        );
        assert_eq!(refusal(result), Refusal::RoleNotPermitted(UserRole::Rider));
    }

    #[test]
    fn completion_prices_the_distance() {
        let trip = completed(10.0);
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.distance_km, Some(10.0));
        assert_eq!(trip.fare, Some(40));
        assert_eq!(trip.rider_id, Some(RIDER));
    }

    #[test]
    fn completion_needs_a_positive_distance() {
        let before = accepted_by_rider();
        let result = apply_transition(
            &before,
            &TripEvent::Complete { distance_km: 0.0 },
            &rider(RIDER, &[VehicleType::Motorcycle]),
        );
        assert_eq!(result, Err(TripError::InvalidDistance { distance_km: 0.0 }));
        assert_eq!(before.status, TripStatus::Accepted);
    }

    #[test]
    fn only_assigned_rider_completes() {
        let result = apply_transition(
            &accepted_by_rider(),
            &TripEvent::Complete { distance_km: 5.0 },
            &rider(OTHER_RIDER, &[VehicleType::Motorcycle]),
        );
        assert_eq!(refusal(result), Refusal::NotAssignedRider);
    }

    #[test]
    fn terminal_trips_accept_no_events() {
        let done = completed(4.0);
        let snapshot = done.clone();
        let events = [
            TripEvent::Accept,
            TripEvent::Reject,
            TripEvent::Cancel,
            TripEvent::Complete { distance_km: 4.0 },
        ];
        let actors = [
            rider(RIDER, &[VehicleType::Motorcycle]),
            student(STUDENT),
            Actor::Admin { id: 1 },
        ];
        for event in &events {
            for actor in &actors {
                let result = apply_transition(&done, event, actor);
                assert_eq!(
                    result,
                    Err(TripError::InvalidStateTransition {
                        from: TripStatus::Completed,
                        event: event.kind(),
                        reason: Refusal::TerminalState,
                    })
                );
            }
        }
        assert_eq!(done, snapshot);
    }

    #[test]
    fn error_names_state_event_and_reason() {
        let err = apply_transition(
            &completed(2.0),
            &TripEvent::Cancel,
            &student(STUDENT),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot cancel a completed trip: the trip is already finished"
        );
        assert!(matches!(
            err,
            TripError::InvalidStateTransition {
                event: EventKind::Cancel,
                ..
            }
        ));
    }

    #[test]
    fn rating_rules() {
        let done = completed(8.0);
        let rated = check_rating(&done, &student(STUDENT), 5).expect("rate");
        assert_eq!(rated.rating, Some(5));

        assert_eq!(
            check_rating(&rated, &student(STUDENT), 4),
            Err(TripError::InvalidRating {
                reason: RatingRefusal::AlreadyRated
            })
        );
        assert_eq!(
            check_rating(&done, &student(STUDENT), 6),
            Err(TripError::InvalidRating {
                reason: RatingRefusal::OutOfRange(6)
            })
        );
        assert_eq!(
            check_rating(&done, &student(STUDENT), 0),
            Err(TripError::InvalidRating {
                reason: RatingRefusal::OutOfRange(0)
            })
        );
        assert_eq!(
            check_rating(&done, &student(STUDENT + 1), 3),
            Err(TripError::InvalidRating {
                reason: RatingRefusal::NotRequestingStudent
            })
        );
        assert_eq!(
            check_rating(&accepted_by_rider(), &student(STUDENT), 3),
            Err(TripError::InvalidRating {
                reason: RatingRefusal::NotCompleted(TripStatus::Accepted)
            })
        );
    }
}
