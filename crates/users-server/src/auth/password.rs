//! Development-only credential check.
//!
//! There is no credential storage: the expected password of a user is its
//! own display name. Never expose this in production.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use users_shared::User;

use crate::db::{Session, StoreError, UserFilter};
use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Looks up the user named `username` and checks `password` against a hash
/// of the username itself.
pub async fn authenticate_user(
    session: &mut Session,
    username: &str,
    password: &str,
) -> Result<Option<User>, StoreError> {
    let Some(user) = session.find_first(UserFilter::displayname(username)).await? else {
        return Ok(None);
    };

    let matches = hash_password(username)
        .and_then(|hash| verify_password(password, &hash))
        .unwrap_or_else(|e| {
            tracing::error!("Password check failed: {}", e);
            false
        });

    Ok(matches.then_some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryDatabase};
    use users_shared::api::UserInput;

    #[test]
    fn hash_verifies_only_the_hashed_password() {
        let hash = hash_password("ada").unwrap();
        assert!(verify_password("ada", &hash).unwrap());
        assert!(!verify_password("grace", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("ada", "not-a-phc-string").is_err());
    }

    #[tokio::test]
    async fn password_must_equal_username() {
        let db = MemoryDatabase::new();
        let mut session = db.session().await.unwrap();
        session
            .create(UserInput {
                displayname: "ada".to_string(),
            })
            .await
            .unwrap();

        let ok = authenticate_user(&mut session, "ada", "ada").await.unwrap();
        assert_eq!(ok.map(|u| u.displayname), Some(Some("ada".to_string())));

        let wrong = authenticate_user(&mut session, "ada", "hunter2").await.unwrap();
        assert!(wrong.is_none());

        let unknown = authenticate_user(&mut session, "bob", "bob").await.unwrap();
        assert!(unknown.is_none());
    }
}
