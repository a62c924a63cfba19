//! Session provider contract and a local in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use tracknow_core::{ErrorKind, OwnerId};

/// Authentication failure with a human-readable message, surfaced to the
/// user as-is. Not handled by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AuthError(pub String);

impl AuthError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<AuthError> for ErrorKind {
    fn from(err: AuthError) -> Self {
        ErrorKind::Auth(err.0)
    }
}

/// The session boundary: current user plus sign-in/sign-up/sign-out.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    fn current_user_id(&self) -> Option<OwnerId>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<OwnerId, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<OwnerId, AuthError>;

    async fn sign_out(&self);
}

struct Account {
    owner: OwnerId,
    password: String,
}

/// In-memory session provider for dev and tests.
///
/// Mirrors the hosted provider's validation rules: well-formed email,
/// password of at least 6 characters, no duplicate sign-up.
#[derive(Default)]
pub struct LocalSessionProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<OwnerId>>,
}

impl LocalSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(email: &str, password: &str) -> Result<(), AuthError> {
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(AuthError::new("The email address is badly formatted."));
        }
        if password.len() < 6 {
            return Err(AuthError::new(
                "Password should be at least 6 characters.",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    fn current_user_id(&self) -> Option<OwnerId> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<OwnerId, AuthError> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let account = accounts
            .get(email)
            .filter(|a| a.password == password)
            .ok_or_else(|| AuthError::new("Invalid email or password."))?;

        let owner = account.owner;
        drop(accounts);

        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(owner);
        tracing::debug!(owner = %owner, "signed in");
        Ok(owner)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<OwnerId, AuthError> {
        Self::validate(email, password)?;

        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        if accounts.contains_key(email) {
            return Err(AuthError::new(
                "The email address is already in use by another account.",
            ));
        }

        let owner = OwnerId::new();
        accounts.insert(
            email.to_string(),
            Account {
                owner,
                password: password.to_string(),
            },
        );
        drop(accounts);

        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(owner);
        tracing::debug!(owner = %owner, "signed up");
        Ok(owner)
    }

    async fn sign_out(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in_round_trips_the_owner() {
        let provider = LocalSessionProvider::new();
        let owner = provider.sign_up("a@b.test", "secret1").await.unwrap();
        assert_eq!(provider.current_user_id(), Some(owner));

        provider.sign_out().await;
        assert_eq!(provider.current_user_id(), None);

        let again = provider.sign_in("a@b.test", "secret1").await.unwrap();
        assert_eq!(again, owner);
    }

    #[tokio::test]
    async fn malformed_email_and_short_password_are_rejected() {
        let provider = LocalSessionProvider::new();
        assert!(provider.sign_up("not-an-email", "secret1").await.is_err());
        assert!(provider.sign_up("a@b.test", "short").await.is_err());
        assert_eq!(provider.current_user_id(), None);
    }

    #[tokio::test]
    async fn duplicate_sign_up_and_wrong_password_are_rejected() {
        let provider = LocalSessionProvider::new();
        provider.sign_up("a@b.test", "secret1").await.unwrap();

        let err = provider.sign_up("a@b.test", "secret2").await.unwrap_err();
        assert!(err.0.contains("already in use"));

        provider.sign_out().await;
        let err = provider.sign_in("a@b.test", "wrong-password").await.unwrap_err();
        assert!(err.0.contains("Invalid email or password"));
        assert_eq!(provider.current_user_id(), None);
    }
}
