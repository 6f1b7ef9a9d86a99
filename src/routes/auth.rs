use axum::{extract::State, Json};

use crate::{
    error::{AppError, AppResult},
    middleware::rate_limit::{check_rate_limit, login_key},
    models::{
        auth::AuthenticatedUser,
        user::{LoginRequest, LoginResponse, MeResponse},
    },
    services::{identity::IdentityService, metrics::LOGINS_COUNTER},
    AppState,
};

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if let Err(e) = check_rate_limit(
        &state.redis_client,
        &login_key(&body.email),
        state.config.login_max_attempts,
        state.config.login_window_secs,
    )
    .await
    {
        LOGINS_COUNTER.with_label_values(&["rate_limited"]).inc();
        return Err(e);
    }

    let result = IdentityService::login(
        &state.db,
        &body.email,
        &body.password,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )
    .await;

    match result {
        Ok(resp) => {
            LOGINS_COUNTER.with_label_values(&["success"]).inc();
            tracing::info!("login: {} as {}", resp.profile.id, resp.role);
            Ok(Json(resp))
        }
        Err(e) => {
            let status = match e {
                AppError::Unauthorized(_) => "failure",
                _ => "error",
            };
            LOGINS_COUNTER.with_label_values(&[status]).inc();
            Err(e)
        }
    }
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MeResponse>> {
    let profile = IdentityService::profile(&state.db, user.role, user.profile_id).await?;
    Ok(Json(MeResponse {
        identity: user.identity,
        role: user.role,
        profile,
    }))
}
