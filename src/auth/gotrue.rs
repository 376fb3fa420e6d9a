// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hosted identity provider speaking the GoTrue REST protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::provider::{IdentityProvider, ProviderSignUp};
use super::session::{Identity, ProviderGrant, Session};
use super::AuthError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: GoTrueUser,
}

/// Sign-up returns a session when confirmation is off, a bare user otherwise.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<GoTrueUser>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorResponse {
    fn text(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
    }
}

pub struct GoTrueIdentityProvider {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl GoTrueIdentityProvider {
    pub fn new(mut base_url: Url, api_key: String) -> Result<Self, AuthError> {
        // Relative joins below must append to the base path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::InternalError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::InternalError(format!("Invalid provider URL: {e}")))
    }

    async fn read_error(response: reqwest::Response) -> (StatusCode, String) {
        let status = response.status();
        let body = response.json::<ErrorResponse>().await.unwrap_or_default();
        let text = body.text().unwrap_or("unknown error").to_string();
        (status, text)
    }
}

fn identity_from(user: GoTrueUser, fallback_email: &str) -> Identity {
    Identity {
        id: user.id,
        email: user.email.unwrap_or_else(|| fallback_email.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for GoTrueIdentityProvider {
    fn name(&self) -> &'static str {
        "gotrue"
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderGrant, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let (status, text) = Self::read_error(response).await;
            // Wrong password, unknown email and unconfirmed email all arrive as 400
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    tracing::debug!(%status, reason = %text, "Provider rejected sign-in");
                    AuthError::InvalidCredentials
                }
                _ => AuthError::Provider(format!("sign-in failed ({status}): {text}")),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid token response: {e}")))?;

        Ok(ProviderGrant {
            identity: identity_from(body.user, email),
            provider_token: Some(body.access_token),
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderSignUp, AuthError> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let (status, text) = Self::read_error(response).await;
            return Err(if status.is_client_error() {
                AuthError::Validation(text)
            } else {
                AuthError::Provider(format!("sign-up failed ({status}): {text}"))
            });
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid sign-up response: {e}")))?;

        match (body.access_token, body.user, body.id) {
            (Some(token), Some(user), _) => Ok(ProviderSignUp::Active(ProviderGrant {
                identity: identity_from(user, email),
                provider_token: Some(token),
            })),
            (None, Some(user), _) => Ok(ProviderSignUp::PendingVerification(identity_from(
                user, email,
            ))),
            (None, None, Some(id)) => Ok(ProviderSignUp::PendingVerification(Identity {
                id,
                email: body.email.unwrap_or_else(|| email.to_string()),
            })),
            _ => Err(AuthError::Provider(
                "sign-up response carried no user".into(),
            )),
        }
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let Some(token) = session.provider_token.as_deref() else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        // An already invalid provider token means the remote side is signed out
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let (status, text) = Self::read_error(response).await;
        Err(AuthError::Provider(format!("sign-out failed ({status}): {text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GoTrueIdentityProvider {
        let base = Url::parse(&server.uri()).unwrap();
        GoTrueIdentityProvider::new(base, "anon-key".into()).unwrap()
    }

    #[tokio::test]
    async fn sign_in_returns_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "provider-token",
                "user": { "id": "user-1", "email": "trader@example.com" }
            })))
            .mount(&server)
            .await;

        let grant = provider(&server)
            .sign_in("trader@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(grant.identity.id, "user-1");
        assert_eq!(grant.provider_token.as_deref(), Some("provider-token"));
    }

    #[tokio::test]
    async fn rejected_credentials_map_to_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let result = provider(&server).sign_in("trader@example.com", "nope00").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn unconfirmed_email_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Email not confirmed"
            })))
            .mount(&server)
            .await;

        let result = provider(&server).sign_in("trader@example.com", "secret1").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn sign_up_without_session_is_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-2",
                "email": "new@example.com"
            })))
            .mount(&server)
            .await;

        let outcome = provider(&server).sign_up("new@example.com", "secret1").await.unwrap();
        assert!(matches!(
            outcome,
            ProviderSignUp::PendingVerification(ref identity) if identity.id == "user-2"
        ));
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = provider(&server).sign_up("new@example.com", "secret1").await;
        assert!(matches!(result, Err(AuthError::Provider(_))));
    }

    #[tokio::test]
    async fn sign_out_posts_provider_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer provider-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session {
            id: "sid".into(),
            token: "local".into(),
            identity: Identity {
                id: "user-1".into(),
                email: "trader@example.com".into(),
            },
            issued_at: Utc::now(),
            expires_at: Utc::now(),
            provider_token: Some("provider-token".into()),
        };
        provider(&server).sign_out(&session).await.unwrap();
    }
}
