use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        meal::{CreateMealRequest, Meal, MealDateQuery, MealRecord, UpsertMealRecordRequest},
    },
    routes::{require_staff, require_teacher},
    services::meals::MealService,
    AppState,
};

/// GET /meals?date=YYYY-MM-DD: all authenticated users (parents included)
pub async fn list_meals(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<MealDateQuery>,
) -> AppResult<Json<Vec<Meal>>> {
    Ok(Json(MealService::list_for_date(&state.db, params.date).await?))
}

/// POST /meals: admins and teachers
pub async fn create_meal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateMealRequest>,
) -> AppResult<(StatusCode, Json<Meal>)> {
    require_staff(&user)?;
    let meal = MealService::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

/// PUT /meal-records: the rating teacher is the caller
pub async fn upsert_meal_record(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpsertMealRecordRequest>,
) -> AppResult<Json<MealRecord>> {
    require_teacher(&user)?;
    let record = MealService::upsert_record(&state.db, user.profile_id, &body).await?;
    Ok(Json(record))
}
