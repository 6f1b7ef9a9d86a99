use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        auth::AuthenticatedUser,
        meal::{MealRecordRangeQuery, MealRecordView},
        student::{CreateStudentRequest, Student, StudentDetail, StudentListQuery, UpdateStudentRequest},
        user::UserRole,
    },
    routes::require_admin,
    services::{
        audit::{self, AuditEntry},
        links::LinkService,
        meals::MealService,
        students::StudentService,
    },
    AppState,
};

/// Parents only see students they are linked to.
async fn ensure_visible(state: &AppState, user: &AuthenticatedUser, student_id: Uuid) -> AppResult<()> {
    if user.role != UserRole::Parent {
        return Ok(());
    }
    let mut conn = state.db.acquire().await?;
    if LinkService::is_linked(&mut conn, user.profile_id, student_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// GET /students?status=active
pub async fn list_students(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<StudentListQuery>,
) -> AppResult<Json<Vec<Student>>> {
    let students = match user.role {
        UserRole::Parent => StudentService::list_for_parent(&state.db, user.profile_id).await?,
        _ => StudentService::list(&state.db, params.status).await?,
    };
    Ok(Json(students))
}

/// GET /students/{id}: the student with its linked parents. A parent only
/// sees its own link.
pub async fn get_student(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StudentDetail>> {
    ensure_visible(&state, &user, id).await?;
    let mut detail = StudentService::get_detail(&state.db, id).await?;
    if user.role == UserRole::Parent {
        detail.parents.retain(|p| p.parent_id == user.profile_id);
    }
    Ok(Json(detail))
}

/// POST /students
pub async fn create_student(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateStudentRequest>,
) -> AppResult<(StatusCode, Json<Student>)> {
    require_admin(&user)?;

    let student = StudentService::create(&state.db, &body).await?;
    audit::log(state.db.clone(), AuditEntry {
        actor_id:       Some(user.identity),
        action:         "create_student",
        resource_type:  "student",
        resource_id:    student.id,
        resource_label: Some(format!("{} {}", student.name, student.last_name)),
    });
    Ok((StatusCode::CREATED, Json(student)))
}

/// PUT /students/{id}
pub async fn update_student(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStudentRequest>,
) -> AppResult<Json<Student>> {
    require_admin(&user)?;

    let student = StudentService::update(&state.db, id, &body).await?;
    audit::log(state.db.clone(), AuditEntry {
        actor_id:       Some(user.identity),
        action:         "update_student",
        resource_type:  "student",
        resource_id:    student.id,
        resource_label: Some(format!("{} {}", student.name, student.last_name)),
    });
    Ok(Json(student))
}

/// GET /students/{id}/meal-records?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn list_meal_records(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(range): Query<MealRecordRangeQuery>,
) -> AppResult<Json<Vec<MealRecordView>>> {
    ensure_visible(&state, &user, id).await?;
    let records = MealService::list_for_student(&state.db, id, range.from, range.to).await?;
    Ok(Json(records))
}
