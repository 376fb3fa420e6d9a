// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate: the only writer of the session store.
//!
//! Credentials are trimmed and validated here before any provider call:
//!
//! | Field    | Rule                                        |
//! |----------|---------------------------------------------|
//! | email    | valid address, at most 255 characters       |
//! | password | between 6 and 100 characters after trimming |

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::provider::{IdentityProvider, ProviderSignUp};
use super::session::{Identity, Session, SessionStore};
use super::AuthError;

pub const MAX_EMAIL_CHARS: usize = 255;
pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MAX_PASSWORD_CHARS: usize = 100;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern is valid")
});

/// Trimmed, validated credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Trim both fields and apply the address and length rules.
    pub fn parse(email: &str, password: &str) -> Result<Self, AuthError> {
        let email = email.trim();
        let password = password.trim();

        if !EMAIL_RE.is_match(email) {
            return Err(AuthError::Validation("Invalid email address".into()));
        }
        if email.chars().count() > MAX_EMAIL_CHARS {
            return Err(AuthError::Validation(
                "Email must be less than 255 characters".into(),
            ));
        }

        let password_len = password.chars().count();
        if password_len < MIN_PASSWORD_CHARS {
            return Err(AuthError::Validation(
                "Password must be at least 6 characters".into(),
            ));
        }
        if password_len > MAX_PASSWORD_CHARS {
            return Err(AuthError::Validation(
                "Password must be less than 100 characters".into(),
            ));
        }

        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

/// Outcome of a sign-up.
///
/// Neither variant says anything about admin rights; those come from the
/// role resolver alone.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    Active(Session),
    PendingVerification(Identity),
}

#[derive(Clone)]
pub struct AuthGate {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionStore,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn IdentityProvider>, sessions: SessionStore) -> Self {
        Self { provider, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let credentials = Credentials::parse(email, password)?;
        let grant = self
            .provider
            .sign_in(&credentials.email, &credentials.password)
            .await?;
        self.sessions.establish(grant).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let credentials = Credentials::parse(email, password)?;
        match self
            .provider
            .sign_up(&credentials.email, &credentials.password)
            .await?
        {
            ProviderSignUp::Active(grant) => {
                Ok(SignUpOutcome::Active(self.sessions.establish(grant).await?))
            }
            ProviderSignUp::PendingVerification(identity) => {
                tracing::info!(identity_id = %identity.id, "Sign-up pending email verification");
                Ok(SignUpOutcome::PendingVerification(identity))
            }
        }
    }

    /// End the session bound to `token`, if any.
    ///
    /// Always succeeds locally. A provider failure is logged and otherwise
    /// ignored; the session is gone either way.
    pub async fn sign_out(&self, token: Option<&str>) {
        let Some(token) = token else {
            return;
        };
        let Some(session) = self.sessions.end(token).await else {
            return;
        };

        if let Err(e) = self.provider.sign_out(&session).await {
            tracing::warn!(
                provider = self.provider.name(),
                session_id = %session.id,
                error = %e,
                "Provider sign-out failed; local session already cleared"
            );
        }
    }

    pub async fn refresh(&self, token: &str) -> Result<Session, AuthError> {
        self.sessions.refresh(token).await
    }
}
