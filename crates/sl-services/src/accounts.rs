//! # Account service
//!
//! Credential hashing and the sign-in/sign-up flows. Sign-in failures are
//! deliberately indistinguishable: unknown email, wrong password and a
//! corrupt stored hash all produce the same `None`, so nothing leaks
//! about which accounts exist.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use chrono::Utc;
use uuid::Uuid;

use sl_core::error::{AppError, Result};
use sl_core::models::User;
use sl_core::traits::UserRepo;
use sl_core::validate::UserDraft;

pub struct AccountService {
    users: Arc<dyn UserRepo>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepo>) -> Self {
        Self { users }
    }

    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    }

    fn verify_password(password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Creates an account from a validated draft. Duplicate unique fields
    /// surface as `Conflict` from the repository.
    pub async fn sign_up(&self, draft: UserDraft, is_admin: bool) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            name: draft.name,
            email: draft.email,
            secondary_email_one: draft.secondary_email_one,
            secondary_email_two: draft.secondary_email_two,
            phone: draft.phone,
            password_hash: Self::hash_password(&draft.password)?,
            is_admin,
            last_login: None,
            created_at: Utc::now(),
        };
        self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }

    /// Credential check. `Ok(Some)` establishes the principal and records
    /// the login timestamp; `Ok(None)` is every kind of rejection, masked.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let candidate = self.users.get_by_email(email.trim().to_lowercase().as_str()).await?;
        let Some(user) = candidate else {
            return Ok(None);
        };
        if !Self::verify_password(password, &user.password_hash) {
            return Ok(None);
        }

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        Ok(Some(User {
            last_login: Some(now),
            ..user
        }))
    }

    /// Applies a validated draft over an existing account. An empty
    /// password in the draft keeps the current credential.
    pub async fn update_account(&self, mut user: User, draft: UserDraft) -> Result<User> {
        user.name = draft.name;
        user.email = draft.email;
        user.secondary_email_one = draft.secondary_email_one;
        user.secondary_email_two = draft.secondary_email_two;
        user.phone = draft.phone;
        if !draft.password.is_empty() {
            user.password_hash = Self::hash_password(&draft.password)?;
        }
        self.users.update(&user).await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = AccountService::hash_password("hunter2!").unwrap();
        assert!(AccountService::verify_password("hunter2!", &hash));
        assert!(!AccountService::verify_password("hunter3!", &hash));
    }

    #[test]
    fn corrupt_stored_hash_never_verifies() {
        assert!(!AccountService::verify_password("anything", "not-a-phc-string"));
    }
}
