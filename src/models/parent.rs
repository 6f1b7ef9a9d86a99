use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::link::{LinkSpec, ParentLinkView, ParentStudentLink};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Parent {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub auth_user_id: Uuid,
    pub name: String,
    pub last_name: String,
    /// Login email; owned by the identity provider and never edited here.
    pub email: String,
    pub phone_number: String,
    pub occupation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateParentRequest {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub occupation: Option<String>,
    /// Generated when omitted; the generated value is returned once.
    pub password: Option<String>,
    #[serde(default)]
    pub students: Vec<LinkSpec>,
}

/// Full replacement of the editable fields. There is no `email` field: it is
/// tied to the login account.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateParentRequest {
    pub name: String,
    pub last_name: String,
    pub phone_number: String,
    pub occupation: Option<String>,
    /// `None` leaves links untouched; `Some` is the complete desired set.
    pub students: Option<Vec<LinkSpec>>,
}

#[derive(Debug, Serialize)]
pub struct ParentDetail {
    #[serde(flatten)]
    pub parent: Parent,
    pub students: Vec<ParentLinkView>,
}

#[derive(Debug, Serialize)]
pub struct CreateParentResponse {
    #[serde(flatten)]
    pub parent: Parent,
    pub links: Vec<ParentStudentLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}
