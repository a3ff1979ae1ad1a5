use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use crate::{
    db::DbPool,
    error::AppError,
    models::vehicle::{Vehicle, VehicleForm, VehicleRow, VehicleType},
};

const VEHICLE_COLUMNS: &str = "id, rider_id, vehicle_type, plate, brand, model, created_at";

#[derive(Clone)]
pub struct VehicleStore {
    db: DbPool,
}

impl VehicleStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list_for_rider(&self, rider_id: i64) -> Result<Vec<Vehicle>, AppError> {
        let rows = sqlx::query_as::<_, VehicleRow>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE rider_id = ?1 ORDER BY id"
        ))
        .bind(rider_id)
        .fetch_all(&self.db)
        .await?;
        into_vehicles(rows)
    }

    pub async fn list_all(&self) -> Result<Vec<Vehicle>, AppError> {
        let rows = sqlx::query_as::<_, VehicleRow>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY rider_id, id"
        ))
        .fetch_all(&self.db)
        .await?;
        into_vehicles(rows)
    }

    /// The rider's capability set, recomputed from their current vehicles.
    pub async fn vehicle_types(&self, rider_id: i64) -> Result<BTreeSet<VehicleType>, AppError> {
        let types: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT vehicle_type FROM vehicles WHERE rider_id = ?1")
                .bind(rider_id)
                .fetch_all(&self.db)
                .await?;
        types
            .iter()
            .map(|raw| {
                raw.parse::<VehicleType>()
                    .map_err(|err| AppError::Other(err.into()))
            })
            .collect()
    }

    pub async fn create(&self, rider_id: i64, form: &VehicleForm) -> Result<Vehicle, AppError> {
        let form = normalize(form)?;
        self.ensure_plate_free(&form.plate, None).await?;
        let id = sqlx::query(
            r#"INSERT INTO vehicles (rider_id, vehicle_type, plate, brand, model, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(rider_id)
        .bind(form.vehicle_type.as_str())
        .bind(&form.plate)
        .bind(&form.brand)
        .bind(&form.model)
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();
        info!(rider_id, vehicle_id = id, vehicle_type = %form.vehicle_type, "vehicle registered");
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Vehicle>, AppError> {
        let row = sqlx::query_as::<_, VehicleRow>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Vehicle::try_from)
            .transpose()
            .map_err(|err| AppError::Other(err.into()))
    }

    /// Edits a vehicle owned by `rider_id`; other riders' vehicles look absent.
    pub async fn update(
        &self,
        rider_id: i64,
        vehicle_id: i64,
        form: &VehicleForm,
    ) -> Result<Vehicle, AppError> {
        let form = normalize(form)?;
        self.ensure_plate_free(&form.plate, Some(vehicle_id)).await?;
        let result = sqlx::query(
            r#"UPDATE vehicles SET vehicle_type = ?1, plate = ?2, brand = ?3, model = ?4
               WHERE id = ?5 AND rider_id = ?6"#,
        )
        .bind(form.vehicle_type.as_str())
        .bind(&form.plate)
        .bind(&form.brand)
        .bind(&form.model)
        .bind(vehicle_id)
        .bind(rider_id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        info!(rider_id, vehicle_id, "vehicle updated");
        self.get(vehicle_id).await?.ok_or(AppError::NotFound)
    }

    /// Deletes a vehicle. With `owner` set only that rider's vehicle matches.
    pub async fn delete(&self, vehicle_id: i64, owner: Option<i64>) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = ?1 AND (?2 IS NULL OR rider_id = ?2)")
            .bind(vehicle_id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        info!(vehicle_id, "vehicle deleted");
        Ok(())
    }

    async fn ensure_plate_free(&self, plate: &str, except: Option<i64>) -> Result<(), AppError> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM vehicles WHERE plate = ?1 AND (?2 IS NULL OR id != ?2)",
        )
        .bind(plate)
        .bind(except)
        .fetch_one(&self.db)
        .await?;
        if taken > 0 {
            return Err(AppError::Conflict(format!(
                "plate {plate} is already registered"
            )));
        }
        Ok(())
    }
}

fn into_vehicles(rows: Vec<VehicleRow>) -> Result<Vec<Vehicle>, AppError> {
    rows.into_iter()
        .map(|row| Vehicle::try_from(row).map_err(|err| AppError::Other(err.into())))
        .collect()
}

fn normalize(form: &VehicleForm) -> Result<VehicleForm, AppError> {
    let plate = form.plate.trim().to_uppercase();
    let brand = form.brand.trim().to_string();
    let model = form.model.trim().to_string();
    if plate.is_empty() || brand.is_empty() || model.is_empty() {
        return Err(AppError::BadRequest(
            "plate, brand and model are required".into(),
        ));
    }
    Ok(VehicleForm {
        vehicle_type: form.vehicle_type,
        plate,
        brand,
        model,
    })
}
