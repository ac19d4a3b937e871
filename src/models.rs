use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Row shape of the `students` table. Deliberately not `Serialize`:
// responses only ever carry the `StudentProfile` projection.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_id: String,
    pub name: String,
    pub email: String,
}

impl From<StudentRecord> for StudentProfile {
    fn from(record: StudentRecord) -> Self {
        Self {
            student_id: record.student_id,
            name: record.name,
            email: record.email,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudent {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStudent {
    pub student_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInStudent {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub student: StudentProfile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    pub student_id: String,
    pub new_data: StudentPatch,
}

// wire-side patch, `password` still in plaintext
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

// storage-side patch, password already hashed
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStudent {
    pub student_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub student_id: Option<String>,
}

pub fn normalize_student_id(raw: &str) -> String {
    raw.trim().to_string()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

lazy_static! {
    static ref EMAIL_SHAPE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}
