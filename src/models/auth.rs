use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserRole;

/// Claims embedded in the JWT access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // identity (auth_users.id)
    pub role: UserRole,
    pub profile: String, // admins/teachers/parents row id
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from the validated JWT, available via Axum extractors
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Uuid,
    pub role: UserRole,
    pub profile_id: Uuid,
}
