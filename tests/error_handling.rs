//! `AppError` → HTTP response mapping. No server or database needed: each
//! test calls `IntoResponse` directly.

use axum::{http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use anaokulu_api::error::AppError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::validation("students[1]: öğrenci seçilmedi");

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "students[1]: öğrenci seçilmedi");
    assert!(json.get("retryable").is_none());
}

#[tokio::test]
async fn not_found_error_names_entity_and_id() {
    let id = Uuid::nil();
    let err = AppError::NotFound { entity: "student", id };

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], format!("student {id} not found"));
}

#[tokio::test]
async fn conflict_is_marked_retryable() {
    let err = AppError::Conflict("stale link set".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(json["retryable"], true);
}

#[tokio::test]
async fn existing_account_is_a_non_retryable_409() {
    let err = AppError::AlreadyExists("ayse@example.com için zaten bir hesap var".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_EXISTS");
    assert!(json.get("retryable").is_none());
}

#[tokio::test]
async fn auth_errors_map_to_401_403_429() {
    let (status, json) = error_to_response(AppError::Unauthorized("no token".into())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, json) = error_to_response(AppError::Forbidden).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");

    let (status, json) = error_to_response(AppError::RateLimited).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn row_not_found_returns_404() {
    let err = AppError::Store(sqlx::Error::RowNotFound);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn internal_error_is_sanitized() {
    let err = AppError::Internal(anyhow::anyhow!("password=hunter2 leaked in connection string"));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("hunter2"));
}

#[tokio::test]
async fn other_store_errors_are_sanitized() {
    let err = AppError::Store(sqlx::Error::PoolTimedOut);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "Bir hata oluştu");
}
