use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "meal_type", rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "meal_rating", rename_all = "snake_case")]
pub enum MealRating {
    NotWell,
    Adequate,
    MoreThanEnough,
}

/// One meal served on a given day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub meal_ingredients: String,
    pub meal_calories: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub meal_ingredients: String,
    pub meal_calories: Option<i32>,
}

/// Query params for GET /meals.
#[derive(Debug, Deserialize)]
pub struct MealDateQuery {
    pub date: NaiveDate,
}

/// How much of a meal a student ate, as rated by a teacher.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub meal_id: Uuid,
    pub teacher_id: Uuid,
    pub rating: MealRating,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for PUT /meal-records (create or replace the rating for a student/meal pair).
#[derive(Debug, Deserialize)]
pub struct UpsertMealRecordRequest {
    pub student_id: Uuid,
    pub meal_id: Uuid,
    pub rating: MealRating,
    pub notes: Option<String>,
}

/// Query params for GET /students/{id}/meal-records.
#[derive(Debug, Deserialize)]
pub struct MealRecordRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// A meal record joined with its meal, for student history views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MealRecordView {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub meal_ingredients: String,
    pub rating: MealRating,
    pub notes: Option<String>,
    pub teacher_id: Uuid,
}
