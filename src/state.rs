use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        places::PlaceStore, trips::TripStore, users::UserStore, vehicles::VehicleStore,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub users: UserStore,
    pub vehicles: VehicleStore,
    pub places: PlaceStore,
    pub trips: TripStore,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            users: UserStore::new(db.clone()),
            vehicles: VehicleStore::new(db.clone()),
            places: PlaceStore::new(db.clone()),
            trips: TripStore::new(db.clone()),
            config,
            db,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
