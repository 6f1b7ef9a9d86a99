use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Extension, Router,
};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{config::Config, middleware::auth::JwtSecret, routes};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis_client: RedisClient,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    // Allow the configured front-end origin, plus localhost for development.
    let base = state.config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o == base || o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1")
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        // Students
        .route(
            "/students",
            get(routes::students::list_students).post(routes::students::create_student),
        )
        .route(
            "/students/{id}",
            get(routes::students::get_student).put(routes::students::update_student),
        )
        .route("/students/{id}/meal-records", get(routes::students::list_meal_records))
        // Parents
        .route(
            "/parents",
            get(routes::parents::list_parents).post(routes::parents::create_parent),
        )
        .route(
            "/parents/{id}",
            get(routes::parents::get_parent).put(routes::parents::update_parent),
        )
        .route("/parents/{id}/students", put(routes::parents::replace_links))
        // Meals
        .route(
            "/meals",
            get(routes::meals::list_meals).post(routes::meals::create_meal),
        )
        .route("/meal-records", put(routes::meals::upsert_meal_record))
        .layer(Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}
