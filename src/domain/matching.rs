use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{
    trip::{Trip, TripDetail},
    vehicle::VehicleType,
};

/// Anything that names the vehicle type needed to serve it.
pub trait RequiresVehicle {
    fn required_vehicle_type(&self) -> VehicleType;
}

impl RequiresVehicle for Trip {
    fn required_vehicle_type(&self) -> VehicleType {
        self.required_vehicle_type
    }
}

impl RequiresVehicle for TripDetail {
    fn required_vehicle_type(&self) -> VehicleType {
        self.trip.required_vehicle_type
    }
}

/// What a rider sees when listing open trips.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "trips", rename_all = "snake_case")]
pub enum TripMatch<T> {
    /// The rider has no vehicle at all, so they should be prompted to add one.
    NoVehiclesRegistered,
    /// The rider has vehicles but none of the open trips needs them.
    NoMatchingVehicle,
    Available(Vec<T>),
}

/// Keeps the trips a rider can serve, in their original order.
pub fn filter_trips_for_rider<T>(rider_vehicle_types: &BTreeSet<VehicleType>, trips: &[T]) -> Vec<T>
where
    T: RequiresVehicle + Clone,
{
    if rider_vehicle_types.is_empty() {
        return Vec::new();
    }
    trips
        .iter()
        .filter(|trip| rider_vehicle_types.contains(&trip.required_vehicle_type()))
        .cloned()
        .collect()
}

pub fn match_pending_trips<T>(rider_vehicle_types: &BTreeSet<VehicleType>, trips: &[T]) -> TripMatch<T>
where
    T: RequiresVehicle + Clone,
{
    if rider_vehicle_types.is_empty() {
        return TripMatch::NoVehiclesRegistered;
    }
    let matching = filter_trips_for_rider(rider_vehicle_types, trips);
    if matching.is_empty() {
        TripMatch::NoMatchingVehicle
    } else {
        TripMatch::Available(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Open(u32, VehicleType);

    impl RequiresVehicle for Open {
        fn required_vehicle_type(&self) -> VehicleType {
            self.1
        }
    }

    fn pool() -> Vec<Open> {
        vec![
            Open(1, VehicleType::Car),
            Open(2, VehicleType::Motorcycle),
            Open(3, VehicleType::Car),
            Open(4, VehicleType::Motorcycle),
        ]
    }

    #[test]
    fn no_vehicles_means_no_trips() {
        let types = BTreeSet::new();
        assert!(filter_trips_for_rider(&types, &pool()).is_empty());
        assert_eq!(
            match_pending_trips(&types, &pool()),
            TripMatch::NoVehiclesRegistered
        );
    }

    #[test]
    fn keeps_matching_trips_in_order() {
        let types = BTreeSet::from([VehicleType::Motorcycle]);
        let trips = pool();
        let filtered = filter_trips_for_rider(&types, &trips);
        assert_eq!(
            filtered,
            vec![
                Open(2, VehicleType::Motorcycle),
                Open(4, VehicleType::Motorcycle)
            ]
        );
        assert_eq!(trips.len(), 4);
    }

    #[test]
    fn both_types_keep_everything() {
        let types = BTreeSet::from([VehicleType::Motorcycle, VehicleType::Car]);
        assert_eq!(filter_trips_for_rider(&types, &pool()), pool());
    }

    #[test]
    fn vehicles_without_a_match_are_reported_separately() {
        let types = BTreeSet::from([VehicleType::Car]);
        let only_bikes = vec![Open(9, VehicleType::Motorcycle)];
        assert_eq!(
            match_pending_trips(&types, &only_bikes),
            TripMatch::NoMatchingVehicle
        );
        assert_eq!(
            match_pending_trips::<Open>(&types, &[]),
            TripMatch::NoMatchingVehicle
        );
    }
}
