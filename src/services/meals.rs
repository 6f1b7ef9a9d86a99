use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::meal::{
        CreateMealRequest, Meal, MealRecord, MealRecordView, UpsertMealRecordRequest,
    },
    services::students::clean_optional,
};

pub struct MealService;

impl MealService {
    /// Meals served on `date`, breakfast first.
    pub async fn list_for_date(pool: &PgPool, date: NaiveDate) -> AppResult<Vec<Meal>> {
        let meals = sqlx::query_as::<_, Meal>(
            "SELECT id, date, meal_type, meal_ingredients, meal_calories, created_at, updated_at
             FROM meals
             WHERE date = $1
             ORDER BY meal_type",
        )
        .bind(date)
        .fetch_all(pool)
        .await?;
        Ok(meals)
    }

    pub async fn create(pool: &PgPool, req: &CreateMealRequest) -> AppResult<Meal> {
        if req.meal_ingredients.trim().is_empty() {
            return Err(AppError::validation("meal_ingredients zorunludur"));
        }
        if matches!(req.meal_calories, Some(c) if c < 0) {
            return Err(AppError::validation("meal_calories negatif olamaz"));
        }

        sqlx::query_as::<_, Meal>(
            "INSERT INTO meals (date, meal_type, meal_ingredients, meal_calories)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (date, meal_type) DO NOTHING
             RETURNING id, date, meal_type, meal_ingredients, meal_calories, created_at, updated_at",
        )
        .bind(req.date)
        .bind(req.meal_type)
        .bind(req.meal_ingredients.trim())
        .bind(req.meal_calories)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!("{} için bu öğün zaten kayıtlı", req.date))
        })
    }

    /// Insert or replace the rating of one student for one meal.
    pub async fn upsert_record(
        pool: &PgPool,
        teacher_id: Uuid,
        req: &UpsertMealRecordRequest,
    ) -> AppResult<MealRecord> {
        let record = sqlx::query_as::<_, MealRecord>(
            "INSERT INTO meal_records (student_id, meal_id, teacher_id, rating, notes)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (student_id, meal_id) DO UPDATE SET
                 teacher_id = EXCLUDED.teacher_id,
                 rating     = EXCLUDED.rating,
                 notes      = EXCLUDED.notes,
                 updated_at = NOW()
             RETURNING id, student_id, meal_id, teacher_id, rating, notes, created_at, updated_at",
        )
        .bind(req.student_id)
        .bind(req.meal_id)
        .bind(teacher_id)
        .bind(req.rating)
        .bind(clean_optional(&req.notes))
        .fetch_one(pool)
        .await?;
        Ok(record)
    }

    /// Meal history of a student, newest first, optionally bounded by date.
    pub async fn list_for_student(
        pool: &PgPool,
        student_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<MealRecordView>> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AppError::validation("from, to tarihinden sonra olamaz"));
            }
        }

        let records = sqlx::query_as::<_, MealRecordView>(
            "SELECT r.id, r.meal_id, m.date, m.meal_type, m.meal_ingredients,
                    r.rating, r.notes, r.teacher_id
             FROM meal_records r
             JOIN meals m ON m.id = r.meal_id
             WHERE r.student_id = $1
               AND ($2::date IS NULL OR m.date >= $2)
               AND ($3::date IS NULL OR m.date <= $3)
             ORDER BY m.date DESC, m.meal_type",
        )
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }
}
