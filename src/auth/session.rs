// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session store: the single source of truth for who is signed in.
//!
//! A session is bound to an HS256 token carrying its session id (`sid`).
//! A token only resolves while its session is still registered here and the
//! token is the session's current one, so sign-out and refresh take effect
//! immediately even though the token itself would still verify.
//!
//! Only the authentication gate mutates the store. Every transition is
//! published on one broadcast channel (see [`SessionStore::subscribe`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use utoipa::ToSchema;

use super::AuthError;

const SESSION_EVENT_CAPACITY: usize = 64;

/// Principal issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    /// Unique identity id
    pub id: String,
    /// Email address the identity signed up with
    pub email: String,
}

/// An authenticated binding of an identity to a client.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id (`sid` claim)
    pub id: String,
    /// Current bearer token for this session
    pub token: String,
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Provider-side token, used to invalidate remotely on sign-out
    pub provider_token: Option<String>,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    SignedIn,
    Refreshed,
    SignedOut,
    Expired,
}

/// Change notification emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session_id: String,
    pub identity_id: String,
}

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    email: String,
    sid: String,
    /// Unique per mint so a refresh never reproduces the previous token
    jti: String,
    iat: i64,
    exp: i64,
}

/// Identity plus optional provider token, as returned by a provider.
#[derive(Debug, Clone)]
pub struct ProviderGrant {
    pub identity: Identity,
    pub provider_token: Option<String>,
}

/// Registry of live sessions.
#[derive(Clone)]
pub struct SessionStore {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    /// Create a store signing tokens with `secret`, valid for `ttl`.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Subscribe to session transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, kind: SessionEventKind, session: &Session) {
        let _ = self.events.send(SessionEvent {
            kind,
            session_id: session.id.clone(),
            identity_id: session.identity.id.clone(),
        });
    }

    fn decode_claims(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the registry so expired sessions get evicted
        validation.validate_exp = false;
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::MalformedToken)
    }

    fn mint(
        &self,
        session_id: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let expires_at = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::InternalError("Session lifetime is out of range".into()))?;
        let claims = SessionClaims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            sid: session_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(format!("Failed to sign session token: {e}")))?;
        Ok((token, expires_at))
    }

    /// Resolve a bearer token to its live session.
    pub async fn authenticate(&self, token: &str) -> Result<Session, AuthError> {
        let claims = self.decode_claims(token)?;

        let expired = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .is_none_or(|exp| exp <= Utc::now());
        if expired {
            let evicted = {
                let mut sessions = self.sessions.write().await;
                match sessions.get(&claims.sid) {
                    Some(session) if session.token == token => sessions.remove(&claims.sid),
                    _ => None,
                }
            };
            if let Some(session) = evicted {
                tracing::info!(session_id = %session.id, identity_id = %session.identity.id, "Session expired");
                self.emit(SessionEventKind::Expired, &session);
            }
            return Err(AuthError::TokenExpired);
        }

        let sessions = self.sessions.read().await;
        match sessions.get(&claims.sid) {
            Some(session) if session.token == token => Ok(session.clone()),
            _ => Err(AuthError::SessionNotFound),
        }
    }

    /// The session bound to `token`, or `None`.
    pub async fn current_session(&self, token: &str) -> Option<Session> {
        self.authenticate(token).await.ok()
    }

    /// Register a new session for a provider grant.
    ///
    /// Expired sessions still in the registry are swept out first, so
    /// abandoned sessions never accumulate.
    pub(crate) async fn establish(&self, grant: ProviderGrant) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session_id = uuid::Uuid::new_v4().to_string();
        let (token, expires_at) = self.mint(&session_id, &grant.identity, now)?;

        let session = Session {
            id: session_id,
            token,
            identity: grant.identity,
            issued_at: now,
            expires_at,
            provider_token: grant.provider_token,
        };

        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let expired = sessions
                .extract_if(|_, existing| !existing.is_valid())
                .map(|(_, existing)| existing)
                .collect();
            sessions.insert(session.id.clone(), session.clone());
            expired
        };
        for stale in &expired {
            tracing::debug!(session_id = %stale.id, identity_id = %stale.identity.id, "Expired session swept");
            self.emit(SessionEventKind::Expired, stale);
        }

        tracing::info!(session_id = %session.id, identity_id = %session.identity.id, "Session established");
        self.emit(SessionEventKind::SignedIn, &session);
        Ok(session)
    }

    /// Re-mint the token of a live session. The old token stops resolving.
    pub(crate) async fn refresh(&self, token: &str) -> Result<Session, AuthError> {
        let current = self.authenticate(token).await?;
        let now = Utc::now();
        let (new_token, expires_at) = self.mint(&current.id, &current.identity, now)?;

        let refreshed = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&current.id)
                .filter(|session| session.token == token)
                .ok_or(AuthError::SessionNotFound)?;
            session.token = new_token;
            session.issued_at = now;
            session.expires_at = expires_at;
            session.clone()
        };

        tracing::debug!(session_id = %refreshed.id, "Session refreshed");
        self.emit(SessionEventKind::Refreshed, &refreshed);
        Ok(refreshed)
    }

    /// Remove the session bound to `token`. Unknown or malformed tokens are
    /// a no-op; expired tokens still end their session.
    pub(crate) async fn end(&self, token: &str) -> Option<Session> {
        let claims = self.decode_claims(token).ok()?;
        let removed = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&claims.sid) {
                Some(session) if session.token == token => sessions.remove(&claims.sid),
                _ => None,
            }
        }?;

        tracing::info!(session_id = %removed.id, identity_id = %removed.identity.id, "Session ended");
        self.emit(SessionEventKind::SignedOut, &removed);
        Some(removed)
    }

    /// Number of registered sessions.
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
