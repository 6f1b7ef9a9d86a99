use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::blank_uuid_as_none;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "relationship_type", rename_all = "snake_case")]
pub enum RelationshipType {
    #[default]
    Mother,
    Father,
    Guardian,
    Other,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Mother => "mother",
            RelationshipType::Father => "father",
            RelationshipType::Guardian => "guardian",
            RelationshipType::Other => "other",
        }
    }
}

/// A persisted parent–student link (`student_parents` row).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ParentStudentLink {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub student_id: Uuid,
    pub relationship_type: RelationshipType,
    pub is_primary_contact: bool,
    pub created_at: DateTime<Utc>,
}

/// One entry of a submitted link set.
///
/// `id` present means "keep (and update) this link"; absent means "create".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkSpec {
    #[serde(default, deserialize_with = "blank_uuid_as_none")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "blank_uuid_as_none")]
    pub student_id: Option<Uuid>,
    #[serde(default)]
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub is_primary_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkUpdate {
    pub id: Uuid,
    pub relationship_type: RelationshipType,
    pub is_primary_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLink {
    pub student_id: Uuid,
    pub relationship_type: RelationshipType,
    pub is_primary_contact: bool,
}

/// Store operations that turn a parent's current link set into the desired one.
/// Apply in field order: deletes, updates, inserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkPlan {
    pub parent_id: Uuid,
    pub to_delete: Vec<Uuid>,
    pub to_update: Vec<LinkUpdate>,
    pub to_insert: Vec<NewLink>,
}

/// Body for PUT /parents/{id}/students
#[derive(Debug, Deserialize)]
pub struct ReplaceLinksRequest {
    pub students: Vec<LinkSpec>,
}

/// A link joined with the student's name, for parent detail views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParentLinkView {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_last_name: String,
    pub relationship_type: RelationshipType,
    pub is_primary_contact: bool,
}

/// [`ParentLinkView`] tagged with its parent, for listing every parent at once.
#[derive(Debug, Clone, FromRow)]
pub struct ParentLinkRow {
    pub parent_id: Uuid,
    #[sqlx(flatten)]
    pub view: ParentLinkView,
}

/// A link joined with the parent's contact details, for student detail views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentParentView {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub occupation: Option<String>,
    pub relationship_type: RelationshipType,
    pub is_primary_contact: bool,
}

#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AppliedLinks {
    pub deleted: u64,
    pub updated: u64,
    pub inserted: u64,
}
