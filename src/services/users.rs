use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        normalize_optional,
        user::{AccountUpdate, ContactUpdate, NewUser, Profile, RiderApproval, User, UserRole},
    },
};

const USER_COLUMNS: &str = "id, uuid, role, email, password_hash, first_name, last_name, phone, \
     address, student_code, national_id, licence_no, approval, created_at, last_login_at";

#[derive(Clone)]
pub struct UserStore {
    db: DbPool,
}

impl UserStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Inserts a new account. `password_hash` must already be hashed.
    pub async fn create(&self, user: &NewUser, password_hash: &str) -> Result<User, AppError> {
        let email = user.email.trim().to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "an account with this email already exists".into(),
            ));
        }
        if let Some(code) = user.student_code.as_deref() {
            let taken: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE student_code = ?1")
                    .bind(code)
                    .fetch_one(&self.db)
                    .await?;
            if taken > 0 {
                return Err(AppError::Conflict(
                    "this student code is already registered".into(),
                ));
            }
        }

        let approval = (user.role == UserRole::Rider).then_some(RiderApproval::Pending.as_str());
        let id = sqlx::query(
            r#"INSERT INTO users (uuid, role, email, password_hash, first_name, last_name, phone, address,
                   student_code, national_id, licence_no, approval, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user.role.as_str())
        .bind(&email)
        .bind(password_hash)
        .bind(user.first_name.trim())
        .bind(user.last_name.trim())
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.student_code)
        .bind(&user.national_id)
        .bind(&user.licence_no)
        .bind(approval)
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    pub async fn get_with_role(&self, id: i64, role: UserRole) -> Result<User, AppError> {
        let user = self.get(id).await?.ok_or(AppError::NotFound)?;
        if user.role != role.as_str() {
            return Err(AppError::NotFound);
        }
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    pub async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at DESC"
        ))
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    pub async fn profile(&self, id: i64) -> Result<Profile, AppError> {
        let user = self.get(id).await?.ok_or(AppError::NotFound)?;
        self.to_profile(user).await
    }

    pub async fn profiles_by_role(&self, role: UserRole) -> Result<Vec<Profile>, AppError> {
        let mut profiles = Vec::new();
        for user in self.list_by_role(role).await? {
            profiles.push(self.to_profile(user).await?);
        }
        Ok(profiles)
    }

    async fn to_profile(&self, user: User) -> Result<Profile, AppError> {
        let rating = if user.role == UserRole::Rider.as_str() {
            self.rider_rating(user.id).await?
        } else {
            None
        };
        user.into_profile(rating)
            .map_err(|err| AppError::Other(err.into()))
    }

    /// Average rating over the rider's rated trips, `None` when nobody rated yet.
    pub async fn rider_rating(&self, rider_id: i64) -> Result<Option<f64>, AppError> {
        let average: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(rating) FROM trips WHERE rider_id = ?1 AND rating IS NOT NULL",
        )
        .bind(rider_id)
        .fetch_one(&self.db)
        .await?;
        Ok(average)
    }

    pub async fn update_contact(&self, id: i64, update: &ContactUpdate) -> Result<(), AppError> {
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&update.first_name) || blank(&update.last_name) {
            return Err(AppError::BadRequest("name fields must not be empty".into()));
        }
        sqlx::query(
            r#"UPDATE users SET
                   first_name = COALESCE(?1, first_name),
                   last_name = COALESCE(?2, last_name),
                   phone = COALESCE(?3, phone),
                   address = COALESCE(?4, address)
               WHERE id = ?5"#,
        )
        .bind(update.first_name.as_deref().map(str::trim))
        .bind(update.last_name.as_deref().map(str::trim))
        .bind(&update.phone)
        .bind(&update.address)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Administrator edit of a student or rider account.
    pub async fn update_account(
        &self,
        id: i64,
        role: UserRole,
        update: &AccountUpdate,
    ) -> Result<User, AppError> {
        self.get_with_role(id, role).await?;
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&update.first_name) || blank(&update.last_name) || blank(&update.email) {
            return Err(AppError::BadRequest("name and email must not be empty".into()));
        }

        let email = update.email.as_deref().map(|e| e.trim().to_lowercase());
        if let Some(email) = email.as_deref() {
            if !email.contains('@') {
                return Err(AppError::BadRequest("a valid email address is required".into()));
            }
            if self.find_by_email(email).await?.is_some_and(|other| other.id != id) {
                return Err(AppError::Conflict(
                    "an account with this email already exists".into(),
                ));
            }
        }
        let student_code = normalize_optional(update.student_code.clone());
        if let Some(code) = student_code.as_deref() {
            let taken: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM users WHERE student_code = ?1 AND id != ?2",
            )
            .bind(code)
            .bind(id)
            .fetch_one(&self.db)
            .await?;
            if taken > 0 {
                return Err(AppError::Conflict(
                    "this student code is already registered".into(),
                ));
            }
        }

        sqlx::query(
            r#"UPDATE users SET
                   email = COALESCE(?1, email),
                   first_name = COALESCE(?2, first_name),
                   last_name = COALESCE(?3, last_name),
                   phone = COALESCE(?4, phone),
                   address = COALESCE(?5, address),
                   student_code = COALESCE(?6, student_code),
                   national_id = COALESCE(?7, national_id),
                   licence_no = COALESCE(?8, licence_no)
               WHERE id = ?9"#,
        )
        .bind(email)
        .bind(update.first_name.as_deref().map(str::trim))
        .bind(update.last_name.as_deref().map(str::trim))
        .bind(normalize_optional(update.phone.clone()))
        .bind(normalize_optional(update.address.clone()))
        .bind(student_code)
        .bind(normalize_optional(update.national_id.clone()))
        .bind(normalize_optional(update.licence_no.clone()))
        .bind(id)
        .execute(&self.db)
        .await?;
        info!(user_id = id, role = %role, "account updated by administrator");
        self.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn touch_login(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn set_rider_approval(
        &self,
        rider_id: i64,
        approval: RiderApproval,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET approval = ?1 WHERE id = ?2 AND role = 'rider'")
            .bind(approval.as_str())
            .bind(rider_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Removes an account that never took part in a trip.
    pub async fn delete(&self, id: i64, role: UserRole) -> Result<(), AppError> {
        let trips: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trips WHERE student_id = ?1 OR rider_id = ?1",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        if trips > 0 {
            return Err(AppError::Conflict(
                "account has trip history and cannot be deleted".into(),
            ));
        }
        let result = sqlx::query("DELETE FROM users WHERE id = ?1 AND role = ?2")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
