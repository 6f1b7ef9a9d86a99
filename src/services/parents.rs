use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        link::{AppliedLinks, LinkSpec, ParentLinkRow, ParentStudentLink},
        parent::{CreateParentRequest, CreateParentResponse, Parent, ParentDetail, UpdateParentRequest},
    },
    services::{
        identity::{normalize_email, IdentityService},
        links::{validate_desired, LinkService},
        metrics,
        students::{clean_optional, require_text},
    },
};

const PARENT_COLUMNS: &str =
    "id, auth_user_id, name, last_name, email, phone_number, occupation, created_at, updated_at";

pub struct ParentService;

impl ParentService {
    /// Every parent with a summary of its linked students.
    pub async fn list(pool: &PgPool) -> AppResult<Vec<ParentDetail>> {
        let mut conn = pool.acquire().await?;
        let parents = sqlx::query_as::<_, Parent>(&format!(
            "SELECT {PARENT_COLUMNS} FROM parents ORDER BY last_name, name"
        ))
        .fetch_all(&mut *conn)
        .await?;
        let links = LinkService::list_all_views(&mut conn).await?;
        Ok(attach_links(parents, links))
    }

    /// Parent with its links, each joined with the student's name.
    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<ParentDetail> {
        let mut conn = pool.acquire().await?;
        let parent = fetch(&mut conn, id).await?;
        let students = LinkService::list_views(&mut conn, id).await?;
        Ok(ParentDetail { parent, students })
    }

    /// Create the login account, the parent row and its initial links in one
    /// transaction. Any failure leaves no account, no parent and no link.
    pub async fn create(pool: &PgPool, req: &CreateParentRequest) -> AppResult<CreateParentResponse> {
        check_create(req)?;

        let generated_password = match &req.password {
            Some(p) if !p.is_empty() => None,
            _ => Some(IdentityService::generate_password()),
        };
        let password = generated_password
            .as_deref()
            .or(req.password.as_deref())
            .unwrap_or_default();

        let mut tx = pool.begin().await?;

        let auth_user_id = IdentityService::create_account(&mut tx, &req.email, password).await?;

        let parent = sqlx::query_as::<_, Parent>(&format!(
            "INSERT INTO parents (auth_user_id, name, last_name, email, phone_number, occupation)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PARENT_COLUMNS}"
        ))
        .bind(auth_user_id)
        .bind(req.name.trim())
        .bind(req.last_name.trim())
        .bind(normalize_email(&req.email))
        .bind(req.phone_number.trim())
        .bind(clean_optional(&req.occupation))
        .fetch_one(&mut *tx)
        .await?;

        let (applied, links) = LinkService::sync(&mut *tx, parent.id, &req.students).await?;

        tx.commit().await?;
        metrics::record_link_ops(&applied);

        tracing::info!(
            "parent created: {} ({}) with {} link(s)",
            parent.id,
            parent.email,
            links.len()
        );

        Ok(CreateParentResponse {
            parent,
            links,
            generated_password,
        })
    }

    /// Update editable fields and, when `req.students` is present, replace the
    /// link set. The parent row is locked for the duration so concurrent edits
    /// of the same parent serialize.
    pub async fn update(pool: &PgPool, id: Uuid, req: &UpdateParentRequest) -> AppResult<ParentDetail> {
        check_update(req)?;

        let mut tx = pool.begin().await?;
        lock(&mut tx, id).await?;

        let parent = sqlx::query_as::<_, Parent>(&format!(
            "UPDATE parents
             SET name = $1, last_name = $2, phone_number = $3, occupation = $4, updated_at = NOW()
             WHERE id = $5
             RETURNING {PARENT_COLUMNS}"
        ))
        .bind(req.name.trim())
        .bind(req.last_name.trim())
        .bind(req.phone_number.trim())
        .bind(clean_optional(&req.occupation))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let applied = match &req.students {
            Some(desired) => LinkService::sync(&mut *tx, id, desired).await?.0,
            None => AppliedLinks::default(),
        };

        let students = LinkService::list_views(&mut tx, id).await?;
        tx.commit().await?;
        metrics::record_link_ops(&applied);

        tracing::info!("parent updated: {}", parent.id);
        Ok(ParentDetail { parent, students })
    }

    /// Replace only the link set of a parent.
    pub async fn replace_links(
        pool: &PgPool,
        id: Uuid,
        desired: &[LinkSpec],
    ) -> AppResult<(AppliedLinks, Vec<ParentStudentLink>)> {
        validate_desired(desired)?;

        let mut tx = pool.begin().await?;
        lock(&mut tx, id).await?;

        let (applied, links) = LinkService::sync(&mut *tx, id, desired).await?;
        tx.commit().await?;
        metrics::record_link_ops(&applied);

        Ok((applied, links))
    }
}

async fn fetch(conn: &mut PgConnection, id: Uuid) -> AppResult<Parent> {
    sqlx::query_as::<_, Parent>(&format!("SELECT {PARENT_COLUMNS} FROM parents WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound { entity: "parent", id })
}

async fn lock(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM parents WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound { entity: "parent", id })?;
    Ok(())
}

/// Everything about a create request that can be rejected without the store.
fn check_create(req: &CreateParentRequest) -> AppResult<()> {
    validate_fields(&req.name, &req.last_name, &req.phone_number)?;
    if !req.email.contains('@') {
        return Err(AppError::validation("Geçerli bir e-posta adresi girin"));
    }
    validate_desired(&req.students)?;
    if let Some(idx) = req.students.iter().position(|s| s.id.is_some()) {
        return Err(AppError::validation(format!(
            "students[{idx}]: yeni veli için mevcut bağlantı verilemez"
        )));
    }
    Ok(())
}

fn check_update(req: &UpdateParentRequest) -> AppResult<()> {
    validate_fields(&req.name, &req.last_name, &req.phone_number)?;
    if let Some(students) = &req.students {
        validate_desired(students)?;
    }
    Ok(())
}

/// Group link rows under their parents, keeping the parents' order.
fn attach_links(parents: Vec<Parent>, links: Vec<ParentLinkRow>) -> Vec<ParentDetail> {
    let mut by_parent: HashMap<Uuid, Vec<_>> = HashMap::new();
    for row in links {
        by_parent.entry(row.parent_id).or_default().push(row.view);
    }
    parents
        .into_iter()
        .map(|parent| {
            let students = by_parent.remove(&parent.id).unwrap_or_default();
            ParentDetail { parent, students }
        })
        .collect()
}

fn validate_fields(name: &str, last_name: &str, phone_number: &str) -> AppResult<()> {
    require_text("name", name)?;
    require_text("last_name", last_name)?;
    require_text("phone_number", phone_number)?;
    Ok(())
}
