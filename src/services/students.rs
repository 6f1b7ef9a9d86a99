use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::student::{
        CreateStudentRequest, Student, StudentDetail, StudentStatus, UpdateStudentRequest,
    },
    services::links::LinkService,
};

pub struct StudentService;

impl StudentService {
    pub async fn list(pool: &PgPool, status: Option<StudentStatus>) -> AppResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            "SELECT * FROM students
             WHERE ($1::student_status IS NULL OR status = $1)
             ORDER BY last_name, name",
        )
        .bind(status)
        .fetch_all(pool)
        .await?;
        Ok(students)
    }

    /// Students linked to a parent, regardless of status.
    pub async fn list_for_parent(pool: &PgPool, parent_id: Uuid) -> AppResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            "SELECT s.* FROM students s
             JOIN student_parents sp ON sp.student_id = s.id
             WHERE sp.parent_id = $1
             ORDER BY s.last_name, s.name",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await?;
        Ok(students)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Student> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound { entity: "student", id })
    }

    /// Student with its parents' contact details and relationship.
    pub async fn get_detail(pool: &PgPool, id: Uuid) -> AppResult<StudentDetail> {
        let student = Self::get(pool, id).await?;
        let mut conn = pool.acquire().await?;
        let parents = LinkService::parents_of_student(&mut conn, id).await?;
        Ok(StudentDetail { student, parents })
    }

    pub async fn create(pool: &PgPool, req: &CreateStudentRequest) -> AppResult<Student> {
        validate_new(req)?;

        let student = sqlx::query_as::<_, Student>(
            "INSERT INTO students (
                 name, last_name, date_of_birth, photo_url, grade_level, academic_year,
                 national_id, enrollment_date, status,
                 has_chronic_illness, medicines, has_allergies, allergies,
                 has_special_dietary_needs, dietary_needs,
                 toilet_training_completed, studied_elsewhere_before, previous_institution_name,
                 has_special_educational_needs, special_educational_needs_details,
                 socialization_status,
                 emergency_contact_name, emergency_contact_phone, emergency_contact_relationship
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                     $17, $18, $19, $20, $21, $22, $23, $24)
             RETURNING *",
        )
        .bind(req.name.trim())
        .bind(req.last_name.trim())
        .bind(req.date_of_birth)
        .bind(clean_optional(&req.photo_url))
        .bind(req.grade_level)
        .bind(req.academic_year.trim())
        .bind(req.national_id.trim())
        .bind(req.enrollment_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(req.status)
        .bind(req.has_chronic_illness)
        .bind(normalize_list(&req.medicines))
        .bind(req.has_allergies)
        .bind(normalize_list(&req.allergies))
        .bind(req.has_special_dietary_needs)
        .bind(normalize_list(&req.dietary_needs))
        .bind(req.toilet_training_completed)
        .bind(req.studied_elsewhere_before)
        .bind(clean_optional(&req.previous_institution_name))
        .bind(req.has_special_educational_needs)
        .bind(normalize_list(&req.special_educational_needs_details))
        .bind(clean_optional(&req.socialization_status))
        .bind(clean_optional(&req.emergency_contact_name))
        .bind(clean_optional(&req.emergency_contact_phone))
        .bind(clean_optional(&req.emergency_contact_relationship))
        .fetch_one(pool)
        .await?;

        tracing::info!("student created: {} ({} {})", student.id, student.name, student.last_name);
        Ok(student)
    }

    /// Partial update. Status transitions (active → inactive / graduated) take
    /// the place of deletion. Optional text fields sent as `""` are cleared.
    pub async fn update(pool: &PgPool, id: Uuid, req: &UpdateStudentRequest) -> AppResult<Student> {
        validate_update(req)?;

        let student = sqlx::query_as::<_, Student>(
            "UPDATE students
             SET name                              = COALESCE($1, name),
                 last_name                         = COALESCE($2, last_name),
                 date_of_birth                     = COALESCE($3, date_of_birth),
                 photo_url                         = CASE WHEN $4::text IS NULL THEN photo_url
                                                          ELSE NULLIF(BTRIM($4), '') END,
                 grade_level                       = COALESCE($5, grade_level),
                 academic_year                     = COALESCE($6, academic_year),
                 national_id                       = COALESCE($7, national_id),
                 enrollment_date                   = COALESCE($8, enrollment_date),
                 status                            = COALESCE($9, status),
                 has_chronic_illness               = COALESCE($10, has_chronic_illness),
                 medicines                         = COALESCE($11, medicines),
                 has_allergies                     = COALESCE($12, has_allergies),
                 allergies                         = COALESCE($13, allergies),
                 has_special_dietary_needs         = COALESCE($14, has_special_dietary_needs),
                 dietary_needs                     = COALESCE($15, dietary_needs),
                 toilet_training_completed         = COALESCE($16, toilet_training_completed),
                 studied_elsewhere_before          = COALESCE($17, studied_elsewhere_before),
                 previous_institution_name         = CASE WHEN $18::text IS NULL THEN previous_institution_name
                                                          ELSE NULLIF(BTRIM($18), '') END,
                 has_special_educational_needs     = COALESCE($19, has_special_educational_needs),
                 special_educational_needs_details = COALESCE($20, special_educational_needs_details),
                 socialization_status              = CASE WHEN $21::text IS NULL THEN socialization_status
                                                          ELSE NULLIF(BTRIM($21), '') END,
                 emergency_contact_name            = CASE WHEN $22::text IS NULL THEN emergency_contact_name
                                                          ELSE NULLIF(BTRIM($22), '') END,
                 emergency_contact_phone           = CASE WHEN $23::text IS NULL THEN emergency_contact_phone
                                                          ELSE NULLIF(BTRIM($23), '') END,
                 emergency_contact_relationship    = CASE WHEN $24::text IS NULL THEN emergency_contact_relationship
                                                          ELSE NULLIF(BTRIM($24), '') END,
                 updated_at                        = NOW()
             WHERE id = $25
             RETURNING *",
        )
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.last_name.as_deref().map(str::trim))
        .bind(req.date_of_birth)
        .bind(&req.photo_url)
        .bind(req.grade_level)
        .bind(req.academic_year.as_deref().map(str::trim))
        .bind(req.national_id.as_deref().map(str::trim))
        .bind(req.enrollment_date)
        .bind(req.status)
        .bind(req.has_chronic_illness)
        .bind(req.medicines.as_deref().map(normalize_list))
        .bind(req.has_allergies)
        .bind(req.allergies.as_deref().map(normalize_list))
        .bind(req.has_special_dietary_needs)
        .bind(req.dietary_needs.as_deref().map(normalize_list))
        .bind(req.toilet_training_completed)
        .bind(req.studied_elsewhere_before)
        .bind(&req.previous_institution_name)
        .bind(req.has_special_educational_needs)
        .bind(req.special_educational_needs_details.as_deref().map(normalize_list))
        .bind(&req.socialization_status)
        .bind(&req.emergency_contact_name)
        .bind(&req.emergency_contact_phone)
        .bind(&req.emergency_contact_relationship)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound { entity: "student", id })?;

        tracing::info!("student updated: {} (status {})", student.id, student.status.as_str());
        Ok(student)
    }
}

fn validate_new(req: &CreateStudentRequest) -> AppResult<()> {
    require_text("name", &req.name)?;
    require_text("last_name", &req.last_name)?;
    require_text("national_id", &req.national_id)?;
    validate_grade_level(req.grade_level)?;
    validate_academic_year(&req.academic_year)?;
    if req.date_of_birth > Utc::now().date_naive() {
        return Err(AppError::validation("date_of_birth gelecekte olamaz"));
    }
    Ok(())
}

fn validate_update(req: &UpdateStudentRequest) -> AppResult<()> {
    if let Some(v) = &req.name {
        require_text("name", v)?;
    }
    if let Some(v) = &req.last_name {
        require_text("last_name", v)?;
    }
    if let Some(v) = &req.national_id {
        require_text("national_id", v)?;
    }
    if let Some(v) = req.grade_level {
        validate_grade_level(v)?;
    }
    if let Some(v) = &req.academic_year {
        validate_academic_year(v)?;
    }
    if matches!(req.date_of_birth, Some(d) if d > Utc::now().date_naive()) {
        return Err(AppError::validation("date_of_birth gelecekte olamaz"));
    }
    Ok(())
}

pub(crate) fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} zorunludur")));
    }
    Ok(())
}

fn validate_grade_level(grade_level: i32) -> AppResult<()> {
    if grade_level < 0 {
        return Err(AppError::validation("grade_level negatif olamaz"));
    }
    Ok(())
}

/// `YYYY-YYYY` with consecutive years, e.g. `2024-2025`.
fn validate_academic_year(value: &str) -> AppResult<()> {
    let invalid = || AppError::validation(format!("academic_year geçersiz: {value:?} (örnek: 2024-2025)"));

    let (start, end) = value.trim().split_once('-').ok_or_else(invalid)?;
    let four_digits = |part: &str| part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit());
    if !four_digits(start) || !four_digits(end) {
        return Err(invalid());
    }
    let start: u16 = start.parse().map_err(|_| invalid())?;
    let end: u16 = end.parse().map_err(|_| invalid())?;
    if end != start + 1 {
        return Err(invalid());
    }
    Ok(())
}

/// Trim entries and drop blank ones. An empty result is kept, so sending `[]`
/// clears a list.
fn normalize_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn clean_optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request() -> CreateStudentRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Elif",
            "last_name": "Yılmaz",
            "date_of_birth": "2020-03-14",
            "academic_year": "2024-2025",
            "national_id": "12345678901",
        }))
        .unwrap()
    }

    #[test]
    fn create_request_defaults() {
        let req = request();
        assert_eq!(req.grade_level, 1);
        assert_eq!(req.status, StudentStatus::Active);
        assert!(req.allergies.is_empty());
        assert!(req.enrollment_date.is_none());
        assert!(validate_new(&req).is_ok());
    }

    #[test]
    fn academic_year_must_span_consecutive_years() {
        assert!(validate_academic_year("2024-2025").is_ok());
        assert!(validate_academic_year(" 2030-2031 ").is_ok());
        assert!(validate_academic_year("2024-2026").is_err());
        assert!(validate_academic_year("2025-2024").is_err());
        assert!(validate_academic_year("24-25").is_err());
        assert!(validate_academic_year("2024/2025").is_err());
        assert!(validate_academic_year("abcd-efgh").is_err());
        assert!(validate_academic_year("+123-0124").is_err());
        assert!(validate_academic_year("2024-+025").is_err());
        assert!(validate_academic_year("2024-2025-2026").is_err());
    }

    #[test]
    fn required_fields_are_checked() {
        let mut req = request();
        req.national_id = "   ".into();
        assert!(matches!(validate_new(&req), Err(AppError::Validation(_))));

        let mut req = request();
        req.grade_level = -1;
        assert!(validate_new(&req).is_err());

        let mut req = request();
        req.date_of_birth = NaiveDate::from_ymd_opt(2999, 1, 1).unwrap();
        assert!(validate_new(&req).is_err());
    }

    #[test]
    fn update_only_checks_present_fields() {
        assert!(validate_update(&UpdateStudentRequest::default()).is_ok());

        let req = UpdateStudentRequest {
            status: Some(StudentStatus::Graduated),
            ..Default::default()
        };
        assert!(validate_update(&req).is_ok());

        let req = UpdateStudentRequest {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_update(&req).is_err());
    }

    #[test]
    fn list_fields_are_trimmed_and_blank_entries_dropped() {
        let items = vec![" fıstık ".to_string(), "".to_string(), "  ".to_string(), "süt".to_string()];
        assert_eq!(normalize_list(&items), vec!["fıstık", "süt"]);
        assert!(normalize_list(&[]).is_empty());
    }

    #[test]
    fn blank_optional_text_becomes_none() {
        assert_eq!(clean_optional(&Some("  ".into())), None);
        assert_eq!(clean_optional(&Some(" Ana Sınıfı ".into())), Some("Ana Sınıfı".into()));
        assert_eq!(clean_optional(&None), None);
    }

    #[test]
    fn detail_embeds_parents_next_to_student_fields() {
        use crate::models::link::{RelationshipType, StudentParentView};

        let student: Student = serde_json::from_value(serde_json::json!({
            "id": "00000000-0000-0000-0000-00000000000a",
            "name": "Elif",
            "last_name": "Yılmaz",
            "date_of_birth": "2020-03-14",
            "photo_url": null,
            "grade_level": 1,
            "academic_year": "2024-2025",
            "national_id": "12345678901",
            "enrollment_date": "2024-09-01",
            "status": "active",
            "has_chronic_illness": false,
            "medicines": [],
            "has_allergies": true,
            "allergies": ["fıstık"],
            "has_special_dietary_needs": false,
            "dietary_needs": [],
            "toilet_training_completed": true,
            "studied_elsewhere_before": false,
            "previous_institution_name": null,
            "has_special_educational_needs": false,
            "special_educational_needs_details": [],
            "socialization_status": null,
            "emergency_contact_name": null,
            "emergency_contact_phone": null,
            "emergency_contact_relationship": null,
            "created_at": "2024-09-01T08:00:00Z",
            "updated_at": "2024-09-01T08:00:00Z",
        }))
        .unwrap();
        let detail = StudentDetail {
            student,
            parents: vec![StudentParentView {
                id: Uuid::from_u128(1),
                parent_id: Uuid::from_u128(2),
                name: "Ayşe".into(),
                last_name: "Yılmaz".into(),
                email: "ayse@example.com".into(),
                phone_number: "05551234567".into(),
                occupation: Some("Öğretmen".into()),
                relationship_type: RelationshipType::Mother,
                is_primary_contact: true,
            }],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["national_id"], "12345678901");
        assert_eq!(json["allergies"][0], "fıstık");
        assert_eq!(json["parents"][0]["phone_number"], "05551234567");
        assert_eq!(json["parents"][0]["relationship_type"], "mother");
        assert_eq!(json["parents"][0]["is_primary_contact"], true);
    }
}
