use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        link::ReplaceLinksRequest,
        parent::{CreateParentRequest, CreateParentResponse, ParentDetail, UpdateParentRequest},
    },
    routes::require_admin,
    services::{
        audit::{self, AuditEntry},
        parents::ParentService,
    },
    AppState,
};

/// GET /parents: each parent with its linked students
pub async fn list_parents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ParentDetail>>> {
    require_admin(&user)?;
    Ok(Json(ParentService::list(&state.db).await?))
}

/// GET /parents/{id}
pub async fn get_parent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ParentDetail>> {
    require_admin(&user)?;
    Ok(Json(ParentService::get(&state.db, id).await?))
}

/// POST /parents: account, parent row and initial links in one go.
pub async fn create_parent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateParentRequest>,
) -> AppResult<(StatusCode, Json<CreateParentResponse>)> {
    require_admin(&user)?;

    let created = ParentService::create(&state.db, &body).await?;
    audit::log(state.db.clone(), AuditEntry {
        actor_id:       Some(user.identity),
        action:         "create_parent",
        resource_type:  "parent",
        resource_id:    created.parent.id,
        resource_label: Some(created.parent.email.clone()),
    });
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /parents/{id}
pub async fn update_parent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateParentRequest>,
) -> AppResult<Json<ParentDetail>> {
    require_admin(&user)?;

    let detail = ParentService::update(&state.db, id, &body).await?;
    audit::log(state.db.clone(), AuditEntry {
        actor_id:       Some(user.identity),
        action:         "update_parent",
        resource_type:  "parent",
        resource_id:    id,
        resource_label: Some(detail.parent.email.clone()),
    });
    Ok(Json(detail))
}

/// PUT /parents/{id}/students: replace the full link set.
pub async fn replace_links(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReplaceLinksRequest>,
) -> AppResult<Json<Value>> {
    require_admin(&user)?;

    let (applied, links) = ParentService::replace_links(&state.db, id, &body.students).await?;
    audit::log(state.db.clone(), AuditEntry {
        actor_id:       Some(user.identity),
        action:         "replace_parent_links",
        resource_type:  "parent",
        resource_id:    id,
        resource_label: Some(format!(
            "-{} ~{} +{}",
            applied.deleted, applied.updated, applied.inserted
        )),
    });
    Ok(Json(json!({ "applied": applied, "links": links })))
}
