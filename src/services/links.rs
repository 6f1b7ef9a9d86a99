use std::collections::HashSet;
use std::future::Future;

use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::link::{
        AppliedLinks, LinkPlan, LinkSpec, LinkUpdate, NewLink, ParentLinkRow, ParentLinkView,
        ParentStudentLink, StudentParentView,
    },
};

const LINK_COLUMNS: &str = "id, parent_id, student_id, relationship_type, is_primary_contact, created_at";

/// Shape checks on a submitted link set that need no stored state.
///
/// Fails with `Validation` when an entry has no student, a student appears
/// twice or a link id appears twice. Run before any store operation.
pub fn validate_desired(desired: &[LinkSpec]) -> AppResult<()> {
    let mut students = HashSet::with_capacity(desired.len());
    let mut ids = HashSet::new();

    for (idx, spec) in desired.iter().enumerate() {
        let student_id = spec
            .student_id
            .ok_or_else(|| AppError::validation(format!("students[{idx}]: öğrenci seçilmedi")))?;

        if !students.insert(student_id) {
            return Err(AppError::validation(format!(
                "students[{idx}]: öğrenci {student_id} birden fazla kez eklendi"
            )));
        }
        if let Some(id) = spec.id {
            if !ids.insert(id) {
                return Err(AppError::validation(format!(
                    "students[{idx}]: bağlantı {id} tekrarlanıyor"
                )));
            }
        }
    }
    Ok(())
}

/// Compute the store operations that turn `current` into `desired` for one parent.
///
/// Pure: nothing is read or written. Entries of `desired` that carry an `id`
/// are kept and updated unconditionally; entries without one are inserted;
/// every current link whose id is not kept is deleted.
///
/// Fails before producing any operation with `Validation` when
/// [`validate_desired`] rejects the set or an entry points an existing link at
/// a different student, and with `Conflict` when an entry names a link that
/// is not in `current` (the editor's snapshot is stale).
pub fn reconcile(
    parent_id: Uuid,
    current: &[ParentStudentLink],
    desired: &[LinkSpec],
) -> AppResult<LinkPlan> {
    validate_desired(desired)?;

    let mut keep_ids = HashSet::new();
    let mut to_update = Vec::new();
    let mut to_insert = Vec::new();

    for (idx, spec) in desired.iter().enumerate() {
        // Checked by validate_desired
        let Some(student_id) = spec.student_id else {
            continue;
        };

        match spec.id {
            Some(id) => {
                let existing = current
                    .iter()
                    .find(|l| l.id == id)
                    .ok_or_else(|| stale_link(id))?;
                // A link is identified by its (parent, student) pair; the student
                // of an existing link cannot be swapped in place.
                if existing.student_id != student_id {
                    return Err(AppError::validation(format!(
                        "students[{idx}]: mevcut bağlantının öğrencisi değiştirilemez; \
                         bağlantıyı kaldırıp yenisini ekleyin"
                    )));
                }
                keep_ids.insert(id);
                to_update.push(LinkUpdate {
                    id,
                    relationship_type: spec.relationship_type,
                    is_primary_contact: spec.is_primary_contact,
                });
            }
            None => to_insert.push(NewLink {
                student_id,
                relationship_type: spec.relationship_type,
                is_primary_contact: spec.is_primary_contact,
            }),
        }
    }

    let to_delete = current
        .iter()
        .filter(|link| !keep_ids.contains(&link.id))
        .map(|link| link.id)
        .collect();

    Ok(LinkPlan {
        parent_id,
        to_delete,
        to_update,
        to_insert,
    })
}

fn stale_link(id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "Bağlantı {id} başka bir kullanıcı tarafından değiştirildi; \
         sayfayı yenileyip tekrar deneyin"
    ))
}

/// The link-table slice of the record store.
pub trait LinkStore: Send {
    /// Links of one parent, oldest first.
    fn links_for_parent(
        &mut self,
        parent_id: Uuid,
    ) -> impl Future<Output = AppResult<Vec<ParentStudentLink>>> + Send;

    /// `(link id, parent id)` for each of `ids` that still exists.
    fn link_owners(&mut self, ids: &[Uuid]) -> impl Future<Output = AppResult<Vec<(Uuid, Uuid)>>> + Send;

    /// Deleting an id that is already gone is not an error.
    fn delete_links(&mut self, ids: &[Uuid]) -> impl Future<Output = AppResult<u64>> + Send;

    /// Fails with `NotFound { entity: "link" }` for the first id that does not
    /// belong to `parent_id`.
    fn update_links(
        &mut self,
        parent_id: Uuid,
        updates: &[LinkUpdate],
    ) -> impl Future<Output = AppResult<()>> + Send;

    /// Fails with `NotFound { entity: "student" }` for the first unknown student.
    fn insert_links(
        &mut self,
        parent_id: Uuid,
        links: &[NewLink],
    ) -> impl Future<Output = AppResult<Vec<ParentStudentLink>>> + Send;
}

/// Execute a plan: deletes, then updates, then inserts.
///
/// Deleting first keeps a replaced (parent, student) pair from tripping the
/// uniqueness constraint. An update whose link has vanished means the plan was
/// computed from a stale snapshot and surfaces as `Conflict`. Callers run this
/// inside a transaction so a failure leaves nothing behind.
pub async fn apply_plan<S: LinkStore>(store: &mut S, plan: &LinkPlan) -> AppResult<AppliedLinks> {
    let deleted = store.delete_links(&plan.to_delete).await?;

    store
        .update_links(plan.parent_id, &plan.to_update)
        .await
        .map_err(|e| match e {
            AppError::NotFound { entity: "link", id } => stale_link(id),
            other => other,
        })?;

    let inserted = store.insert_links(plan.parent_id, &plan.to_insert).await?;

    Ok(AppliedLinks {
        deleted,
        updated: plan.to_update.len() as u64,
        inserted: inserted.len() as u64,
    })
}

impl LinkStore for PgConnection {
    async fn links_for_parent(&mut self, parent_id: Uuid) -> AppResult<Vec<ParentStudentLink>> {
        let links = sqlx::query_as::<_, ParentStudentLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM student_parents
             WHERE parent_id = $1
             ORDER BY created_at, id"
        ))
        .bind(parent_id)
        .fetch_all(&mut *self)
        .await?;
        Ok(links)
    }

    async fn link_owners(&mut self, ids: &[Uuid]) -> AppResult<Vec<(Uuid, Uuid)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let owners = sqlx::query_as("SELECT id, parent_id FROM student_parents WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self)
            .await?;
        Ok(owners)
    }

    async fn delete_links(&mut self, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let res = sqlx::query("DELETE FROM student_parents WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self)
            .await?;
        Ok(res.rows_affected())
    }

    async fn update_links(&mut self, parent_id: Uuid, updates: &[LinkUpdate]) -> AppResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
        let kinds: Vec<&str> = updates.iter().map(|u| u.relationship_type.as_str()).collect();
        let primary: Vec<bool> = updates.iter().map(|u| u.is_primary_contact).collect();

        // One statement for the whole batch
        let touched: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE student_parents AS sp
             SET relationship_type  = u.relationship_type::relationship_type,
                 is_primary_contact = u.is_primary_contact
             FROM UNNEST($1::uuid[], $2::text[], $3::bool[])
                  AS u(id, relationship_type, is_primary_contact)
             WHERE sp.id = u.id AND sp.parent_id = $4
             RETURNING sp.id",
        )
        .bind(&ids)
        .bind(&kinds)
        .bind(&primary)
        .bind(parent_id)
        .fetch_all(&mut *self)
        .await?;

        let touched: HashSet<Uuid> = touched.into_iter().collect();
        match ids.into_iter().find(|id| !touched.contains(id)) {
            Some(id) => Err(AppError::NotFound { entity: "link", id }),
            None => Ok(()),
        }
    }

    async fn insert_links(
        &mut self,
        parent_id: Uuid,
        links: &[NewLink],
    ) -> AppResult<Vec<ParentStudentLink>> {
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let students: Vec<Uuid> = links.iter().map(|l| l.student_id).collect();

        let known: HashSet<Uuid> =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM students WHERE id = ANY($1)")
                .bind(&students)
                .fetch_all(&mut *self)
                .await?
                .into_iter()
                .collect();
        if let Some(id) = students.iter().find(|id| !known.contains(id)) {
            return Err(AppError::NotFound { entity: "student", id: *id });
        }

        let kinds: Vec<&str> = links.iter().map(|l| l.relationship_type.as_str()).collect();
        let primary: Vec<bool> = links.iter().map(|l| l.is_primary_contact).collect();

        let inserted = sqlx::query_as::<_, ParentStudentLink>(&format!(
            "INSERT INTO student_parents (parent_id, student_id, relationship_type, is_primary_contact)
             SELECT $1, u.student_id, u.relationship_type::relationship_type, u.is_primary_contact
             FROM UNNEST($2::uuid[], $3::text[], $4::bool[])
                  AS u(student_id, relationship_type, is_primary_contact)
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(parent_id)
        .bind(&students)
        .bind(&kinds)
        .bind(&primary)
        .fetch_all(&mut *self)
        .await?;
        Ok(inserted)
    }
}

pub struct LinkService;

impl LinkService {
    /// Reconcile and apply a parent's desired link set, returning what was
    /// done and the resulting links. The caller owns the transaction and must
    /// already hold the parent row lock.
    pub async fn sync<S: LinkStore>(
        store: &mut S,
        parent_id: Uuid,
        desired: &[LinkSpec],
    ) -> AppResult<(AppliedLinks, Vec<ParentStudentLink>)> {
        validate_desired(desired)?;
        let current = store.links_for_parent(parent_id).await?;

        // A link id this parent does not hold either belongs to another parent
        // (never valid) or was removed since the editor loaded it (stale).
        let unknown: Vec<Uuid> = desired
            .iter()
            .filter_map(|spec| spec.id)
            .filter(|id| !current.iter().any(|l| l.id == *id))
            .collect();
        if !unknown.is_empty() {
            let owners = store.link_owners(&unknown).await?;
            if let Some((id, _)) = owners.iter().find(|(_, owner)| *owner != parent_id) {
                let idx = desired.iter().position(|s| s.id == Some(*id)).unwrap_or_default();
                return Err(AppError::validation(format!(
                    "students[{idx}]: bağlantı {id} bu veliye ait değil"
                )));
            }
        }

        let plan = reconcile(parent_id, &current, desired)?;
        let applied = apply_plan(&mut *store, &plan).await?;
        info!(
            "links synced for parent {}: {} deleted, {} updated, {} inserted",
            parent_id, applied.deleted, applied.updated, applied.inserted
        );
        let links = store.links_for_parent(parent_id).await?;
        Ok((applied, links))
    }

    pub async fn list_views(
        conn: &mut PgConnection,
        parent_id: Uuid,
    ) -> AppResult<Vec<ParentLinkView>> {
        let views = sqlx::query_as(
            "SELECT sp.id, sp.student_id, s.name AS student_name, s.last_name AS student_last_name,
                    sp.relationship_type, sp.is_primary_contact
             FROM student_parents sp
             JOIN students s ON s.id = sp.student_id
             WHERE sp.parent_id = $1
             ORDER BY s.last_name, s.name",
        )
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(views)
    }

    /// Every link with its student name, tagged with the owning parent.
    pub async fn list_all_views(conn: &mut PgConnection) -> AppResult<Vec<ParentLinkRow>> {
        let rows = sqlx::query_as(
            "SELECT sp.parent_id, sp.id, sp.student_id, s.name AS student_name,
                    s.last_name AS student_last_name, sp.relationship_type, sp.is_primary_contact
             FROM student_parents sp
             JOIN students s ON s.id = sp.student_id
             ORDER BY s.last_name, s.name",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Parents of a student with their contact details, primary contacts first.
    pub async fn parents_of_student(
        conn: &mut PgConnection,
        student_id: Uuid,
    ) -> AppResult<Vec<StudentParentView>> {
        let views = sqlx::query_as(
            "SELECT sp.id, sp.parent_id, p.name, p.last_name, p.email, p.phone_number,
                    p.occupation, sp.relationship_type, sp.is_primary_contact
             FROM student_parents sp
             JOIN parents p ON p.id = sp.parent_id
             WHERE sp.student_id = $1
             ORDER BY sp.is_primary_contact DESC, p.last_name, p.name",
        )
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(views)
    }

    /// Whether `parent_id` is linked to `student_id`.
    pub async fn is_linked(
        conn: &mut PgConnection,
        parent_id: Uuid,
        student_id: Uuid,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM student_parents WHERE parent_id = $1 AND student_id = $2)",
        )
        .bind(parent_id)
        .bind(student_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::link::RelationshipType;
    use chrono::Utc;

    /// In-memory record store for link rows.
    #[derive(Default)]
    struct MemoryLinkStore {
        links: Vec<ParentStudentLink>,
        students: HashSet<Uuid>,
        next_id: u128,
    }

    impl LinkStore for MemoryLinkStore {
        async fn links_for_parent(&mut self, parent_id: Uuid) -> AppResult<Vec<ParentStudentLink>> {
            Ok(self.links.iter().filter(|l| l.parent_id == parent_id).cloned().collect())
        }

        async fn link_owners(&mut self, ids: &[Uuid]) -> AppResult<Vec<(Uuid, Uuid)>> {
            Ok(self
                .links
                .iter()
                .filter(|l| ids.contains(&l.id))
                .map(|l| (l.id, l.parent_id))
                .collect())
        }

        async fn delete_links(&mut self, ids: &[Uuid]) -> AppResult<u64> {
            let before = self.links.len();
            self.links.retain(|l| !ids.contains(&l.id));
            Ok((before - self.links.len()) as u64)
        }

        async fn update_links(&mut self, parent_id: Uuid, updates: &[LinkUpdate]) -> AppResult<()> {
            for u in updates {
                let link = self
                    .links
                    .iter_mut()
                    .find(|l| l.id == u.id && l.parent_id == parent_id)
                    .ok_or(AppError::NotFound { entity: "link", id: u.id })?;
                link.relationship_type = u.relationship_type;
                link.is_primary_contact = u.is_primary_contact;
            }
            Ok(())
        }

        async fn insert_links(
            &mut self,
            parent_id: Uuid,
            links: &[NewLink],
        ) -> AppResult<Vec<ParentStudentLink>> {
            if let Some(l) = links.iter().find(|l| !self.students.contains(&l.student_id)) {
                return Err(AppError::NotFound { entity: "student", id: l.student_id });
            }
            let mut out = Vec::new();
            for l in links {
                if self
                    .links
                    .iter()
                    .any(|x| x.parent_id == parent_id && x.student_id == l.student_id)
                {
                    return Err(AppError::Conflict("uq_student_parents_pair".into()));
                }
                self.next_id += 1;
                let row = ParentStudentLink {
                    id: Uuid::from_u128(0xFFFF_0000 + self.next_id),
                    parent_id,
                    student_id: l.student_id,
                    relationship_type: l.relationship_type,
                    is_primary_contact: l.is_primary_contact,
                    created_at: Utc::now(),
                };
                self.links.push(row.clone());
                out.push(row);
            }
            Ok(out)
        }
    }

    const PARENT: Uuid = Uuid::from_u128(0xAA);
    const OTHER_PARENT: Uuid = Uuid::from_u128(0xBB);
    const A: Uuid = Uuid::from_u128(0xA);
    const B: Uuid = Uuid::from_u128(0xB);
    const C: Uuid = Uuid::from_u128(0xC);

    fn link_id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn stored(id: u128, student: Uuid) -> ParentStudentLink {
        ParentStudentLink {
            id: link_id(id),
            parent_id: PARENT,
            student_id: student,
            relationship_type: RelationshipType::Mother,
            is_primary_contact: false,
            created_at: Utc::now(),
        }
    }

    fn keep(id: u128, student: Uuid) -> LinkSpec {
        LinkSpec {
            id: Some(link_id(id)),
            student_id: Some(student),
            ..Default::default()
        }
    }

    fn add(student: Uuid, kind: RelationshipType, primary: bool) -> LinkSpec {
        LinkSpec {
            id: None,
            student_id: Some(student),
            relationship_type: kind,
            is_primary_contact: primary,
        }
    }

    fn store_with(links: Vec<ParentStudentLink>) -> MemoryLinkStore {
        MemoryLinkStore {
            links,
            students: [A, B, C].into_iter().collect(),
            next_id: 0,
        }
    }

    #[test]
    fn unchanged_set_updates_everything_and_nothing_else() {
        let current = vec![stored(1, A), stored(2, B)];
        let desired = vec![keep(1, A), keep(2, B)];

        let plan = reconcile(PARENT, &current, &desired).unwrap();

        assert!(plan.to_delete.is_empty());
        assert!(plan.to_insert.is_empty());
        let updated: Vec<Uuid> = plan.to_update.iter().map(|u| u.id).collect();
        assert_eq!(updated, vec![link_id(1), link_id(2)]);
    }

    #[test]
    fn removed_entry_is_deleted() {
        let current = vec![stored(1, A), stored(2, B)];
        let desired = vec![keep(1, A)];

        let plan = reconcile(PARENT, &current, &desired).unwrap();

        assert_eq!(plan.to_delete, vec![link_id(2)]);
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].id, link_id(1));
        assert!(plan.to_insert.is_empty());
    }

    #[test]
    fn new_entry_is_inserted() {
        let desired = vec![add(A, RelationshipType::Mother, true)];

        let plan = reconcile(PARENT, &[], &desired).unwrap();

        assert!(plan.to_delete.is_empty());
        assert!(plan.to_update.is_empty());
        assert_eq!(
            plan.to_insert,
            vec![NewLink {
                student_id: A,
                relationship_type: RelationshipType::Mother,
                is_primary_contact: true,
            }]
        );
        assert_eq!(plan.parent_id, PARENT);
    }

    #[test]
    fn mixed_diff() {
        let current = vec![stored(1, A), stored(2, B)];
        let mut first = keep(1, A);
        first.relationship_type = RelationshipType::Father;
        let desired = vec![first, add(C, RelationshipType::Guardian, false)];

        let plan = reconcile(PARENT, &current, &desired).unwrap();

        assert_eq!(plan.to_delete, vec![link_id(2)]);
        assert_eq!(
            plan.to_update,
            vec![LinkUpdate {
                id: link_id(1),
                relationship_type: RelationshipType::Father,
                is_primary_contact: false,
            }]
        );
        assert_eq!(
            plan.to_insert,
            vec![NewLink {
                student_id: C,
                relationship_type: RelationshipType::Guardian,
                is_primary_contact: false,
            }]
        );
    }

    #[test]
    fn duplicate_student_is_rejected() {
        let current = vec![stored(1, A)];
        let desired = vec![keep(1, A), add(A, RelationshipType::Father, false)];

        let err = reconcile(PARENT, &current, &desired).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = reconcile(
            PARENT,
            &[],
            &[
                add(A, RelationshipType::Mother, false),
                add(A, RelationshipType::Mother, false),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn missing_student_is_rejected() {
        let desired = vec![add(A, RelationshipType::Mother, false), LinkSpec::default()];

        let err = reconcile(PARENT, &[], &desired).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.starts_with("students[1]")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn repeated_link_id_is_rejected() {
        let current = vec![stored(1, A)];
        let desired = vec![keep(1, A), keep(1, B)];

        let err = reconcile(PARENT, &current, &desired).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn existing_link_cannot_change_student() {
        let current = vec![stored(1, A)];
        let desired = vec![keep(1, B)];

        let err = reconcile(PARENT, &current, &desired).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn form_defaults_and_blank_student() {
        let spec: LinkSpec =
            serde_json::from_str(r#"{ "student_id": "0000000000000000000000000000000a" }"#).unwrap();
        assert_eq!(spec.student_id, Some(A));
        assert_eq!(spec.id, None);
        assert_eq!(spec.relationship_type, RelationshipType::Mother);
        assert!(!spec.is_primary_contact);

        let blank: LinkSpec =
            serde_json::from_str(r#"{ "id": "", "student_id": "", "relationship_type": "other" }"#)
                .unwrap();
        assert_eq!(blank.student_id, None);
        assert!(matches!(
            reconcile(PARENT, &[], &[blank]),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn applied_plan_matches_desired_set() {
        let mut store = store_with(vec![stored(1, A), stored(2, B)]);
        let mut first = keep(1, A);
        first.relationship_type = RelationshipType::Father;
        first.is_primary_contact = true;
        let desired = vec![first, add(C, RelationshipType::Guardian, false)];

        let current = store.links_for_parent(PARENT).await.unwrap();
        let plan = reconcile(PARENT, &current, &desired).unwrap();
        let applied = apply_plan(&mut store, &plan).await.unwrap();
        assert_eq!(
            applied,
            AppliedLinks { deleted: 1, updated: 1, inserted: 1 }
        );

        let mut after: Vec<(Uuid, RelationshipType, bool)> = store
            .links_for_parent(PARENT)
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.student_id, l.relationship_type, l.is_primary_contact))
            .collect();
        after.sort_by_key(|(s, _, _)| *s);
        assert_eq!(
            after,
            vec![
                (A, RelationshipType::Father, true),
                (C, RelationshipType::Guardian, false),
            ]
        );

        // A second pass over the new state changes nothing but attributes.
        let current = store.links_for_parent(PARENT).await.unwrap();
        let again: Vec<LinkSpec> = current
            .iter()
            .map(|l| LinkSpec {
                id: Some(l.id),
                student_id: Some(l.student_id),
                relationship_type: l.relationship_type,
                is_primary_contact: l.is_primary_contact,
            })
            .collect();
        let plan = reconcile(PARENT, &current, &again).unwrap();
        assert!(plan.to_delete.is_empty() && plan.to_insert.is_empty());
        assert_eq!(plan.to_update.len(), 2);
    }

    #[tokio::test]
    async fn removing_and_re_adding_a_student_does_not_collide() {
        let mut store = store_with(vec![stored(1, A)]);
        let desired = vec![add(A, RelationshipType::Other, true)];

        let current = store.links_for_parent(PARENT).await.unwrap();
        let plan = reconcile(PARENT, &current, &desired).unwrap();
        apply_plan(&mut store, &plan).await.unwrap();

        let after = store.links_for_parent(PARENT).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_ne!(after[0].id, link_id(1));
        assert_eq!(after[0].relationship_type, RelationshipType::Other);
    }

    #[tokio::test]
    async fn stale_snapshot_surfaces_as_conflict() {
        // The editor loaded link 1, then someone else deleted it.
        let mut store = store_with(vec![]);
        let plan = reconcile(PARENT, &[stored(1, A)], &[keep(1, A)]).unwrap();

        let err = apply_plan(&mut store, &plan).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let mut store = store_with(vec![]);
        let ghost = Uuid::from_u128(0xDEAD);
        let plan = reconcile(PARENT, &[], &[add(ghost, RelationshipType::Mother, false)]).unwrap();

        let err = apply_plan(&mut store, &plan).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "student", id } if id == ghost));
    }

    #[test]
    fn link_missing_from_current_is_a_conflict() {
        let current = vec![stored(1, A)];
        let desired = vec![keep(2, A)];

        let err = reconcile(PARENT, &current, &desired).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn shape_checks_need_no_stored_links() {
        assert!(validate_desired(&[]).is_ok());
        assert!(validate_desired(&[keep(1, A), add(B, RelationshipType::Father, true)]).is_ok());
        assert!(matches!(
            validate_desired(&[add(A, RelationshipType::Mother, false), LinkSpec::default()]),
            Err(AppError::Validation(msg)) if msg.starts_with("students[1]")
        ));
        assert!(validate_desired(&[keep(1, A), keep(1, B)]).is_err());
    }

    #[tokio::test]
    async fn sync_applies_plan_and_returns_links() {
        let mut store = store_with(vec![stored(1, A)]);
        let desired = vec![keep(1, A), add(B, RelationshipType::Father, true)];

        let (applied, links) = LinkService::sync(&mut store, PARENT, &desired).await.unwrap();

        assert_eq!(applied, AppliedLinks { deleted: 0, updated: 1, inserted: 1 });
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|l| l.student_id == B && l.is_primary_contact));
    }

    #[tokio::test]
    async fn sync_rejects_link_of_another_parent_without_writing() {
        let mut foreign = stored(5, B);
        foreign.parent_id = OTHER_PARENT;
        let mut store = store_with(vec![stored(1, A), foreign]);
        let before = store.links.clone();

        let desired = vec![keep(1, A), keep(5, B)];
        let err = LinkService::sync(&mut store, PARENT, &desired).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("students[1]")));
        assert_eq!(store.links, before);
    }

    #[tokio::test]
    async fn sync_reports_removed_link_as_retryable_conflict() {
        // Link 9 was shown to the editor, then deleted by someone else.
        let mut store = store_with(vec![stored(1, A)]);
        let before = store.links.clone();

        let err = LinkService::sync(&mut store, PARENT, &[keep(9, A)]).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.links, before);
    }

    #[tokio::test]
    async fn sync_rejects_blank_student_without_writing() {
        let mut store = store_with(vec![stored(1, A)]);
        let before = store.links.clone();

        let err = LinkService::sync(&mut store, PARENT, &[LinkSpec::default()]).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.links, before);
    }
}
