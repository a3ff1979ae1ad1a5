use chrono::Utc;
use url::Url;

use crate::{
    db::DbPool,
    error::AppError,
    models::place::{Place, PlaceForm},
};

#[derive(Clone)]
pub struct PlaceStore {
    db: DbPool,
}

impl PlaceStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Place>, AppError> {
        let places = sqlx::query_as::<_, Place>(
            "SELECT id, name, map_link, created_at FROM places ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(places)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Place>, AppError> {
        let place = sqlx::query_as::<_, Place>(
            "SELECT id, name, map_link, created_at FROM places WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(place)
    }

    pub async fn create(&self, form: &PlaceForm) -> Result<Place, AppError> {
        let (name, map_link) = validate(form)?;
        self.ensure_name_free(&name, None).await?;
        let id = sqlx::query("INSERT INTO places (name, map_link, created_at) VALUES (?1, ?2, ?3)")
            .bind(&name)
            .bind(&map_link)
            .bind(Utc::now())
            .execute(&self.db)
            .await?
            .last_insert_rowid();
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn update(&self, id: i64, form: &PlaceForm) -> Result<Place, AppError> {
        let (name, map_link) = validate(form)?;
        self.ensure_name_free(&name, Some(id)).await?;
        let result = sqlx::query("UPDATE places SET name = ?1, map_link = ?2 WHERE id = ?3")
            .bind(&name)
            .bind(&map_link)
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let used: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trips WHERE pickup_place_id = ?1 OR destination_place_id = ?1",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        if used > 0 {
            return Err(AppError::Conflict(
                "place is referenced by trips and cannot be deleted".into(),
            ));
        }
        let result = sqlx::query("DELETE FROM places WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> Result<(), AppError> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM places WHERE name = ?1 AND (?2 IS NULL OR id != ?2)",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.db)
        .await?;
        if taken > 0 {
            return Err(AppError::Conflict(format!("place `{name}` already exists")));
        }
        Ok(())
    }
}

fn validate(form: &PlaceForm) -> Result<(String, Option<String>), AppError> {
    let name = form.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("place name is required".into()));
    }
    let map_link = match form.map_link.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(link) => {
            let url = Url::parse(link)
                .map_err(|err| AppError::BadRequest(format!("invalid map link: {err}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::BadRequest(
                    "map link must be an http(s) URL".into(),
                ));
            }
            Some(url.to_string())
        }
    };
    Ok((name, map_link))
}
