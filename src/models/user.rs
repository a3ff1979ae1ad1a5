use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

use super::{normalize_optional, vehicle::Vehicle, ParseEnumError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserRole {
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "rider")]
    Rider,
    #[serde(rename = "admin")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Rider => "rider",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "rider" => Ok(UserRole::Rider),
            "admin" => Ok(UserRole::Admin),
            other => Err(ParseEnumError::new("user role", other)),
        }
    }
}

/// Whether an administrator has cleared a rider to take trips.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiderApproval {
    #[default]
    Pending,
    Approved,
    Suspended,
}

impl RiderApproval {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiderApproval::Pending => "pending",
            RiderApproval::Approved => "approved",
            RiderApproval::Suspended => "suspended",
        }
    }
}

impl fmt::Display for RiderApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiderApproval {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RiderApproval::Pending),
            "approved" => Ok(RiderApproval::Approved),
            "suspended" => Ok(RiderApproval::Suspended),
            other => Err(ParseEnumError::new("rider approval", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub role: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub student_code: Option<String>,
    pub national_id: Option<String>,
    pub licence_no: Option<String>,
    pub approval: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Result<UserRole, ParseEnumError> {
        self.role.parse()
    }

    pub fn approval(&self) -> Result<Option<RiderApproval>, ParseEnumError> {
        self.approval.as_deref().map(str::parse).transpose()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn contact(&self) -> Contact {
        Contact {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            created_at: self.created_at,
        }
    }

    /// Projects the stored row onto the role-specific profile shape.
    pub fn into_profile(self, rider_rating: Option<f64>) -> Result<Profile, ParseEnumError> {
        let contact = self.contact();
        let approval = self.approval()?;
        let profile = match self.role()? {
            UserRole::Student => Profile::Student(StudentProfile {
                contact,
                student_code: self.student_code,
                national_id: self.national_id,
            }),
            UserRole::Rider => Profile::Rider(RiderProfile {
                contact,
                national_id: self.national_id,
                licence_no: self.licence_no,
                approval: approval.unwrap_or_default(),
                rating: rider_rating,
            }),
            UserRole::Admin => Profile::Admin(AdminProfile { contact }),
        };
        Ok(profile)
    }
}

/// Fields every role shares, under one name per concept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentProfile {
    #[serde(flatten)]
    pub contact: Contact,
    pub student_code: Option<String>,
    pub national_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiderProfile {
    #[serde(flatten)]
    pub contact: Contact,
    pub national_id: Option<String>,
    pub licence_no: Option<String>,
    pub approval: RiderApproval,
    /// Average of the ratings students left on completed trips.
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminProfile {
    #[serde(flatten)]
    pub contact: Contact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Student(StudentProfile),
    Rider(RiderProfile),
    Admin(AdminProfile),
}

impl Profile {
    pub fn contact(&self) -> &Contact {
        match self {
            Profile::Student(p) => &p.contact,
            Profile::Rider(p) => &p.contact,
            Profile::Admin(p) => &p.contact,
        }
    }

    pub fn role(&self) -> UserRole {
        match self {
            Profile::Student(_) => UserRole::Student,
            Profile::Rider(_) => UserRole::Rider,
            Profile::Admin(_) => UserRole::Admin,
        }
    }
}

/// Everything needed to create an account of any role.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub role: UserRole,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub student_code: Option<String>,
    pub national_id: Option<String>,
    pub licence_no: Option<String>,
}

/// Sign-up payload shared by the public and admin registration routes.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub student_code: Option<String>,
    pub national_id: Option<String>,
    pub licence_no: Option<String>,
}

impl RegistrationForm {
    /// Student codes are kept only for students and licences only for riders.
    pub fn into_new_user(self, role: UserRole) -> NewUser {
        NewUser {
            role,
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: normalize_optional(self.phone),
            address: normalize_optional(self.address),
            student_code: normalize_optional(self.student_code)
                .filter(|_| role == UserRole::Student),
            national_id: normalize_optional(self.national_id),
            licence_no: normalize_optional(self.licence_no).filter(|_| role == UserRole::Rider),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Administrator edit of an account. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub student_code: Option<String>,
    pub national_id: Option<String>,
    pub licence_no: Option<String>,
}

/// What a student may see about a rider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublicRider {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub vehicles: Vec<Vehicle>,
}
