use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::link::StudentParentView;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "student_status", rename_all = "snake_case")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Graduated,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 3] = [
        StudentStatus::Active,
        StudentStatus::Inactive,
        StudentStatus::Graduated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Graduated => "graduated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub photo_url: Option<String>,
    pub grade_level: i32,
    pub academic_year: String,
    pub national_id: String,
    pub enrollment_date: NaiveDate,
    pub status: StudentStatus,
    // Health
    pub has_chronic_illness: bool,
    pub medicines: Vec<String>,
    pub has_allergies: bool,
    pub allergies: Vec<String>,
    pub has_special_dietary_needs: bool,
    pub dietary_needs: Vec<String>,
    // Education
    pub toilet_training_completed: bool,
    pub studied_elsewhere_before: bool,
    pub previous_institution_name: Option<String>,
    pub has_special_educational_needs: bool,
    pub special_educational_needs_details: Vec<String>,
    pub socialization_status: Option<String>,
    // Emergency contact
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A student with the parents linked to it.
#[derive(Debug, Serialize)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub parents: Vec<StudentParentView>,
}

fn default_grade_level() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub photo_url: Option<String>,
    #[serde(default = "default_grade_level")]
    pub grade_level: i32,
    pub academic_year: String,
    pub national_id: String,
    /// Defaults to today.
    pub enrollment_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default)]
    pub has_chronic_illness: bool,
    #[serde(default)]
    pub medicines: Vec<String>,
    #[serde(default)]
    pub has_allergies: bool,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub has_special_dietary_needs: bool,
    #[serde(default)]
    pub dietary_needs: Vec<String>,
    #[serde(default)]
    pub toilet_training_completed: bool,
    #[serde(default)]
    pub studied_elsewhere_before: bool,
    pub previous_institution_name: Option<String>,
    #[serde(default)]
    pub has_special_educational_needs: bool,
    #[serde(default)]
    pub special_educational_needs_details: Vec<String>,
    pub socialization_status: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub photo_url: Option<String>,
    pub grade_level: Option<i32>,
    pub academic_year: Option<String>,
    pub national_id: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
    pub has_chronic_illness: Option<bool>,
    pub medicines: Option<Vec<String>>,
    pub has_allergies: Option<bool>,
    pub allergies: Option<Vec<String>>,
    pub has_special_dietary_needs: Option<bool>,
    pub dietary_needs: Option<Vec<String>>,
    pub toilet_training_completed: Option<bool>,
    pub studied_elsewhere_before: Option<bool>,
    pub previous_institution_name: Option<String>,
    pub has_special_educational_needs: Option<bool>,
    pub special_educational_needs_details: Option<Vec<String>>,
    pub socialization_status: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
}

/// Query params for GET /students.
#[derive(Debug, Deserialize)]
pub struct StudentListQuery {
    pub status: Option<StudentStatus>,
}
