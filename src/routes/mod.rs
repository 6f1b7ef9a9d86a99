pub mod auth;
pub mod health;
pub mod meals;
pub mod metrics;
pub mod parents;
pub mod students;

use crate::{
    error::AppError,
    models::{auth::AuthenticatedUser, user::UserRole},
};

/// Only admins may perform student and parent write operations.
pub(crate) fn require_admin(user: &AuthenticatedUser) -> Result<(), AppError> {
    match user.role {
        UserRole::Admin => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

pub(crate) fn require_staff(user: &AuthenticatedUser) -> Result<(), AppError> {
    if user.role.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub(crate) fn require_teacher(user: &AuthenticatedUser) -> Result<(), AppError> {
    match user.role {
        UserRole::Teacher => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}
