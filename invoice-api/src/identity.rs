use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::repository::UserRepository;

/// Registration and password login on top of a [`UserRepository`].
///
/// bcrypt runs on the blocking thread pool so hashing never stalls the
/// runtime.
#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    hash_cost: u32,
    /// Hash verified against when the email is unknown, so both failure
    /// paths take the same time.
    dummy_hash: Arc<OnceCell<String>>,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UserRepository>, hash_cost: u32) -> Self {
        Self {
            users,
            hash_cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Creates a user with a freshly hashed password.
    ///
    /// Input shape (email syntax, password length) is checked by the caller.
    pub async fn register(
        &self,
        full_name: String,
        email: String,
        password: String,
    ) -> Result<User, AppError> {
        let password_hash = hash_password(password, self.hash_cost).await?;

        let user = self
            .users
            .insert(NewUser {
                full_name,
                email,
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, "User registered");

        Ok(user)
    }

    /// Returns the user id if the email exists and the password matches.
    pub async fn authenticate(&self, email: &str, password: String) -> Result<Uuid, AppError> {
        let user = self.users.find_by_email(email).await?;

        let hash = match &user {
            Some(u) => u.password_hash.clone(),
            None => self.dummy_hash().await?.to_string(),
        };

        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| anyhow!("Password verification task failed: {}", e))?
            .unwrap_or_else(|e| {
                warn!(error = %e, "Stored password hash could not be verified");
                false
            });

        match user {
            Some(u) if matches => {
                info!(user_id = %u.id, "User logged in");
                Ok(u.id)
            }
            _ => Err(AppError::InvalidCredentials),
        }
    }

    async fn dummy_hash(&self) -> Result<&str, AppError> {
        let cost = self.hash_cost;
        let hash = self
            .dummy_hash
            .get_or_try_init(|| hash_password("not-a-real-password".to_string(), cost))
            .await?;
        Ok(hash.as_str())
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| anyhow!("Password hashing task failed: {}", e))?
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryUserRepository;

    fn service() -> IdentityService {
        IdentityService::new(Arc::new(InMemoryUserRepository::default()), 4)
    }

    #[tokio::test]
    async fn register_hashes_password() {
        let identity = service();
        let user = identity
            .register("A".into(), "a@x.com".into(), "secret1".into())
            .await
            .unwrap();

        assert_ne!(user.password_hash, "secret1");
        assert!(bcrypt::verify("secret1", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let identity = service();
        identity
            .register("A".into(), "a@x.com".into(), "secret1".into())
            .await
            .unwrap();

        let err = identity
            .register("B".into(), "a@x.com".into(), "secret2".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn authenticate_accepts_correct_password() {
        let identity = service();
        let user = identity
            .register("A".into(), "a@x.com".into(), "secret1".into())
            .await
            .unwrap();

        let id = identity
            .authenticate("a@x.com", "secret1".into())
            .await
            .unwrap();
        assert_eq!(id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let identity = service();
        identity
            .register("A".into(), "a@x.com".into(), "secret1".into())
            .await
            .unwrap();

        let wrong = identity
            .authenticate("a@x.com", "nope".into())
            .await
            .unwrap_err();
        let unknown = identity
            .authenticate("b@x.com", "secret1".into())
            .await
            .unwrap_err();

        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }
}
