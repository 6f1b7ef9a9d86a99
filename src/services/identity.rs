use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::Rng;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        auth::Claims,
        user::{LoginResponse, UserProfile, UserRole},
    },
};

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%&*";
const GENERATED_PASSWORD_LEN: usize = 12;
pub const MIN_PASSWORD_LEN: usize = 6;
const BCRYPT_COST: u32 = 12;

/// Local identity provider: login accounts live in `auth_users`, roles are
/// given by a row in `admins`, `teachers` or `parents`.
pub struct IdentityService;

impl IdentityService {
    /// Create a login account. Runs on the caller's connection so it can share
    /// a transaction with the profile row that goes with it.
    pub async fn create_account(
        conn: &mut PgConnection,
        email: &str,
        password: &str,
    ) -> AppResult<Uuid> {
        let email = normalize_email(email);
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Şifre en az {MIN_PASSWORD_LEN} karakter olmalıdır"
            )));
        }

        let password_hash = bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt: {e}")))?;

        let id: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO auth_users (email, password_hash)
             VALUES ($1, $2)
             ON CONFLICT (email) DO NOTHING
             RETURNING id",
        )
        .bind(&email)
        .bind(&password_hash)
        .fetch_optional(&mut *conn)
        .await?;

        id.ok_or_else(|| AppError::AlreadyExists(format!("{email} için zaten bir hesap var")))
    }

    /// Verify credentials and return the identity.
    pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> AppResult<Uuid> {
        let invalid = || AppError::Unauthorized("Geçersiz e-posta veya şifre".into());

        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, password_hash FROM auth_users WHERE email = $1")
                .bind(normalize_email(email))
                .fetch_optional(pool)
                .await?;
        let (id, hash) = row.ok_or_else(invalid)?;

        match bcrypt::verify(password, &hash) {
            Ok(true) => Ok(id),
            _ => Err(invalid()),
        }
    }

    /// Role of an identity, with the id of its role-table row.
    ///
    /// An identity present in several role tables gets the strongest role
    /// (admin, then teacher, then parent).
    pub async fn resolve_role(
        pool: &PgPool,
        identity: Uuid,
    ) -> AppResult<Option<(UserRole, Uuid)>> {
        let row: Option<(String, Uuid)> = sqlx::query_as(
            "SELECT role, id FROM (
                 SELECT 'admin'   AS role, id, 1 AS rank FROM admins   WHERE auth_user_id = $1
                 UNION ALL
                 SELECT 'teacher' AS role, id, 2 AS rank FROM teachers WHERE auth_user_id = $1
                 UNION ALL
                 SELECT 'parent'  AS role, id, 3 AS rank FROM parents  WHERE auth_user_id = $1
             ) r
             ORDER BY rank
             LIMIT 1",
        )
        .bind(identity)
        .fetch_optional(pool)
        .await?;

        match row {
            Some((role, id)) => Ok(Some((role.parse::<UserRole>()?, id))),
            None => Ok(None),
        }
    }

    pub async fn profile(pool: &PgPool, role: UserRole, profile_id: Uuid) -> AppResult<UserProfile> {
        // Table name comes from a closed enum, never from input.
        let table = match role {
            UserRole::Admin => "admins",
            UserRole::Teacher => "teachers",
            UserRole::Parent => "parents",
        };
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT id, name, last_name, email FROM {table} WHERE id = $1"
        ))
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound { entity: table, id: profile_id })
    }

    /// Authenticate, resolve the role and issue an access token.
    pub async fn login(
        pool: &PgPool,
        email: &str,
        password: &str,
        jwt_secret: &str,
        ttl_seconds: u64,
    ) -> AppResult<LoginResponse> {
        let identity = Self::authenticate(pool, email, password).await?;
        let (role, profile_id) = Self::resolve_role(pool, identity)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Bu hesaba bir rol atanmamış".into()))?;

        let access_token =
            Self::issue_access_token(identity, role, profile_id, jwt_secret, ttl_seconds)?;
        let profile = Self::profile(pool, role, profile_id).await?;

        Ok(LoginResponse {
            access_token,
            role,
            profile,
        })
    }

    pub fn issue_access_token(
        identity: Uuid,
        role: UserRole,
        profile_id: Uuid,
        secret: &str,
        ttl_seconds: u64,
    ) -> AppResult<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: identity.to_string(),
            role,
            profile: profile_id.to_string(),
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(e.into()))?;
        Ok(token)
    }

    /// Random initial password for accounts created by an admin.
    pub fn generate_password() -> String {
        let mut rng = rand::thread_rng();
        (0..GENERATED_PASSWORD_LEN)
            .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
            .collect()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    #[test]
    fn generated_passwords_use_the_alphabet() {
        let a = IdentityService::generate_password();
        let b = IdentityService::generate_password();

        assert_eq!(a.len(), GENERATED_PASSWORD_LEN);
        assert!(a.bytes().all(|c| PASSWORD_ALPHABET.contains(&c)));
        // 70^12 possibilities; a collision here means the RNG is broken
        assert_ne!(a, b);
    }

    #[test]
    fn issued_token_carries_identity_and_role() {
        let identity = Uuid::new_v4();
        let profile = Uuid::new_v4();
        let token =
            IdentityService::issue_access_token(identity, UserRole::Teacher, profile, "s3cret", 60)
                .unwrap();

        let user = decode_access_token(&token, "s3cret").unwrap();
        assert_eq!(user.identity, identity);
        assert_eq!(user.role, UserRole::Teacher);
        assert_eq!(user.profile_id, profile);

        assert!(decode_access_token(&token, "other").is_err());
    }

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  Ayse@Example.COM "), "ayse@example.com");
    }
}
