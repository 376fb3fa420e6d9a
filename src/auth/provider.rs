// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider seam.
//!
//! The gate never checks passwords itself; it hands trimmed credentials to an
//! [`IdentityProvider`]. Two implementations exist:
//!
//! - [`LocalIdentityProvider`]: argon2-hashed identities on the data volume
//! - [`GoTrueIdentityProvider`](super::gotrue::GoTrueIdentityProvider): a
//!   hosted GoTrue-compatible auth service

use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use unicode_normalization::UnicodeNormalization;

use super::session::{Identity, ProviderGrant, Session};
use super::AuthError;
use crate::storage::{FileStorage, IdentityRepository, StorageError, StoredIdentity};

/// Result of a provider sign-up.
#[derive(Debug, Clone)]
pub enum ProviderSignUp {
    /// The identity can sign in right away.
    Active(ProviderGrant),
    /// The identity exists but must confirm its email first.
    PendingVerification(Identity),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderGrant, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderSignUp, AuthError>;

    /// Invalidate the provider side of a session.
    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;
}

/// Canonical form used to key local identities (NFKC, lower-case).
pub fn normalize_email(email: &str) -> String {
    email.nfkc().collect::<String>().to_lowercase()
}

/// Identities stored as JSON under `/data/identities/`.
pub struct LocalIdentityProvider {
    storage: Arc<FileStorage>,
    require_verification: bool,
    /// Held across the email lookup and the write in `create`.
    registration: Mutex<()>,
}

impl LocalIdentityProvider {
    pub fn new(storage: Arc<FileStorage>, require_verification: bool) -> Self {
        Self {
            storage,
            require_verification,
            registration: Mutex::new(()),
        }
    }

    /// Mark an identity's email as confirmed.
    pub fn confirm_email(&self, identity_id: &str) -> Result<(), AuthError> {
        let repo = IdentityRepository::new(&self.storage);
        let mut stored = repo.get(identity_id).map_err(|e| match e {
            StorageError::NotFound(_) => AuthError::Validation("Unknown identity".into()),
            other => AuthError::InternalError(other.to_string()),
        })?;
        stored.verified = true;
        repo.update(&stored)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| AuthError::InternalError(format!("Failed to build salt: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InternalError(format!("Failed to hash password: {e}")))
}

fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::InternalError(format!("Password task failed: {e}")))?
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderGrant, AuthError> {
        let email = normalize_email(email);
        let stored = IdentityRepository::new(&self.storage)
            .find_by_email(&email)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        let Some(stored) = stored else {
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let phc = stored.password_hash.clone();
        let matches = blocking(move || Ok(verify_password(&password, &phc))).await?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        if self.require_verification && !stored.verified {
            tracing::debug!(identity_id = %stored.id, "Sign-in refused for unverified identity");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(ProviderGrant {
            identity: Identity {
                id: stored.id,
                email: stored.email,
            },
            provider_token: None,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderSignUp, AuthError> {
        let email = normalize_email(email);
        let password = password.to_string();
        let password_hash = blocking(move || hash_password(&password)).await?;

        let stored = StoredIdentity {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash,
            verified: !self.require_verification,
            created_at: Utc::now(),
        };

        {
            let _registration = self
                .registration
                .lock()
                .map_err(|_| AuthError::InternalError("Registration lock poisoned".into()))?;
            IdentityRepository::new(&self.storage)
                .create(&stored)
                .map_err(|e| match e {
                    StorageError::AlreadyExists(_) => {
                        AuthError::Validation("User already registered".into())
                    }
                    other => AuthError::InternalError(other.to_string()),
                })?;
        }

        tracing::info!(identity_id = %stored.id, verified = stored.verified, "Identity registered");

        let identity = Identity {
            id: stored.id,
            email: stored.email,
        };
        if stored.verified {
            Ok(ProviderSignUp::Active(ProviderGrant {
                identity,
                provider_token: None,
            }))
        } else {
            Ok(ProviderSignUp::PendingVerification(identity))
        }
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), AuthError> {
        // Nothing is held provider-side for local identities
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn provider(require_verification: bool) -> (TempDir, LocalIdentityProvider) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, LocalIdentityProvider::new(Arc::new(storage), require_verification))
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("Trader@Example.COM"), "trader@example.com");
        // Fullwidth letters fold under NFKC
        assert_eq!(normalize_email("ｔrader@example.com"), "trader@example.com");
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let (_temp, provider) = provider(false);

        let outcome = provider.sign_up("Trader@Example.com", "secret1").await.unwrap();
        let ProviderSignUp::Active(grant) = outcome else {
            panic!("expected active identity");
        };
        assert_eq!(grant.identity.email, "trader@example.com");

        let signed_in = provider.sign_in("trader@example.com", "secret1").await.unwrap();
        assert_eq!(signed_in.identity.id, grant.identity.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (_temp, provider) = provider(false);
        provider.sign_up("trader@example.com", "secret1").await.unwrap();

        assert!(matches!(
            provider.sign_in("trader@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.sign_in("nobody@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let (_temp, provider) = provider(false);
        provider.sign_up("trader@example.com", "secret1").await.unwrap();

        assert!(matches!(
            provider.sign_up("TRADER@example.com", "secret2").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn verification_gates_sign_in() {
        let (_temp, provider) = provider(true);

        let ProviderSignUp::PendingVerification(identity) =
            provider.sign_up("trader@example.com", "secret1").await.unwrap()
        else {
            panic!("expected pending verification");
        };

        assert!(matches!(
            provider.sign_in("trader@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));

        provider.confirm_email(&identity.id).unwrap();
        assert!(provider.sign_in("trader@example.com", "secret1").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sign_ups_register_one_identity() {
        let (_temp, provider) = provider(false);
        let provider = Arc::new(provider);

        let attempts: Vec<_> = (0..8)
            .map(|i| {
                let provider = provider.clone();
                tokio::spawn(async move {
                    provider
                        .sign_up("trader@example.com", &format!("secret-{i}"))
                        .await
                })
            })
            .collect();

        let mut registered = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => registered += 1,
                Err(AuthError::Validation(message)) => {
                    assert_eq!(message, "User already registered")
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(registered, 1);
        let stored = provider
            .storage
            .list_files(provider.storage.paths().identities_dir(), "json")
            .unwrap();
        assert_eq!(stored.len(), 1);
    }
}
