pub mod places;
pub mod reports;
pub mod trips;
pub mod users;
pub mod vehicles;
