// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the parsed [`AppConfig`].
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for identities, roles, objects and records | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_BASE_URL` | Externally visible origin used in image URLs | `http://localhost:8080` |
//! | `OBJECT_BUCKET` | Bucket holding journal images | `trading-journals` |
//! | `IMAGE_URL_MODE` | `public` or `signed` | `public` |
//! | `SIGNED_URL_TTL_SECS` | Lifetime of signed image URLs | `3600` |
//! | `URL_SIGNING_SECRET` | HMAC key for signed URLs | Required when mode is `signed` |
//! | `SESSION_SECRET` | HS256 key for session tokens (≥32 bytes) | Required |
//! | `SESSION_TTL_SECS` | Session lifetime | `3600` |
//! | `IDENTITY_PROVIDER` | `local` or `gotrue` | `local` |
//! | `GOTRUE_URL` | GoTrue base URL | Required for `gotrue` |
//! | `GOTRUE_API_KEY` | GoTrue `apikey` header | Required for `gotrue` |
//! | `REQUIRE_EMAIL_VERIFICATION` | Local provider: new accounts start unverified (confirm with `confirm-email`) | `false` |
//! | `SEED_ADMIN_USER_ID` | Identity granted `admin` at startup | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::journal::UrlPolicy;
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Origin that image URLs are minted under. Must be reachable by browsers.
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";

pub const OBJECT_BUCKET_ENV: &str = "OBJECT_BUCKET";
pub const DEFAULT_OBJECT_BUCKET: &str = "trading-journals";

/// Selects the image URL policy for the whole deployment.
///
/// - `public`: entries store a durable public URL
/// - `signed`: entries store the storage key; reads mint expiring URLs
pub const IMAGE_URL_MODE_ENV: &str = "IMAGE_URL_MODE";
pub const SIGNED_URL_TTL_SECS_ENV: &str = "SIGNED_URL_TTL_SECS";
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
pub const URL_SIGNING_SECRET_ENV: &str = "URL_SIGNING_SECRET";

pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const MIN_SESSION_SECRET_BYTES: usize = 32;
pub const SESSION_TTL_SECS_ENV: &str = "SESSION_TTL_SECS";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Upper bound for `SESSION_TTL_SECS` and `SIGNED_URL_TTL_SECS` (5 years).
pub const MAX_TTL_SECS: u64 = 5 * 365 * 24 * 60 * 60;

pub const IDENTITY_PROVIDER_ENV: &str = "IDENTITY_PROVIDER";
pub const GOTRUE_URL_ENV: &str = "GOTRUE_URL";
pub const GOTRUE_API_KEY_ENV: &str = "GOTRUE_API_KEY";
/// Local provider only. New accounts start unverified and cannot sign in
/// until confirmed out-of-band with `trading-journal confirm-email <identity_id>`
/// (see [`crate::auth::LocalIdentityProvider::confirm_email`]).
pub const REQUIRE_EMAIL_VERIFICATION_ENV: &str = "REQUIRE_EMAIL_VERIFICATION";

/// Identity to provision with the `admin` role at startup (idempotent).
pub const SEED_ADMIN_USER_ID_ENV: &str = "SEED_ADMIN_USER_ID";

/// Environment variable for log output format.
///
/// - `json`: one JSON object per line (production)
/// - `pretty`: human-readable (development)
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

/// Which identity provider backs the authentication gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProviderConfig {
    Local { require_email_verification: bool },
    GoTrue { url: Url, api_key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Parsed runtime configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub public_base_url: Url,
    pub bucket: String,
    pub url_policy: UrlPolicy,
    pub url_signing_secret: Option<String>,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub identity_provider: IdentityProviderConfig,
    pub seed_admin_user_id: Option<String>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("bind_addr", &self.bind_addr)
            .field("public_base_url", &self.public_base_url.as_str())
            .field("bucket", &self.bucket)
            .field("url_policy", &self.url_policy)
            .field("session_ttl", &self.session_ttl)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(invalid(name, format!("expected a boolean, got `{other}`"))),
    }
}

fn parse_secs(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|e| invalid(name, e.to_string()))?;
    if secs > MAX_TTL_SECS {
        return Err(invalid(name, format!("must be at most {MAX_TTL_SECS} seconds")));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| invalid(name, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(name, "scheme must be http or https"));
    }
    Ok(url)
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .map_err(|e| invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(HOST_ENV, e.to_string()))?;

        let public_base_url = parse_url(
            PUBLIC_BASE_URL_ENV,
            &get(PUBLIC_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
        )?;

        let bucket = get(OBJECT_BUCKET_ENV).unwrap_or_else(|| DEFAULT_OBJECT_BUCKET.to_string());
        crate::storage::objects::validate_key(&bucket)
            .ok()
            .filter(|_| !bucket.contains('/'))
            .ok_or_else(|| invalid(OBJECT_BUCKET_ENV, "must be a single path segment"))?;

        let signed_ttl = match get(SIGNED_URL_TTL_SECS_ENV) {
            Some(value) => parse_secs(SIGNED_URL_TTL_SECS_ENV, &value)?,
            None => Duration::from_secs(DEFAULT_SIGNED_URL_TTL_SECS),
        };
        if signed_ttl.is_zero() {
            return Err(invalid(SIGNED_URL_TTL_SECS_ENV, "must be positive"));
        }

        let url_signing_secret = get(URL_SIGNING_SECRET_ENV);
        let url_policy = match get(IMAGE_URL_MODE_ENV)
            .map(|mode| mode.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("public") => UrlPolicy::Public,
            Some("signed") => {
                if url_signing_secret.is_none() {
                    return Err(ConfigError::Missing(URL_SIGNING_SECRET_ENV));
                }
                UrlPolicy::Signed { ttl: signed_ttl }
            }
            Some(other) => {
                return Err(invalid(
                    IMAGE_URL_MODE_ENV,
                    format!("expected `public` or `signed`, got `{other}`"),
                ))
            }
        };

        let session_secret = get(SESSION_SECRET_ENV).ok_or(ConfigError::Missing(SESSION_SECRET_ENV))?;
        if session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(invalid(
                SESSION_SECRET_ENV,
                format!("must be at least {MIN_SESSION_SECRET_BYTES} bytes"),
            ));
        }
        let session_ttl = match get(SESSION_TTL_SECS_ENV) {
            Some(value) => parse_secs(SESSION_TTL_SECS_ENV, &value)?,
            None => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        };

        let identity_provider = match get(IDENTITY_PROVIDER_ENV)
            .map(|kind| kind.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("local") => IdentityProviderConfig::Local {
                require_email_verification: match get(REQUIRE_EMAIL_VERIFICATION_ENV) {
                    Some(value) => parse_bool(REQUIRE_EMAIL_VERIFICATION_ENV, &value)?,
                    None => false,
                },
            },
            Some("gotrue") => IdentityProviderConfig::GoTrue {
                url: parse_url(
                    GOTRUE_URL_ENV,
                    &get(GOTRUE_URL_ENV).ok_or(ConfigError::Missing(GOTRUE_URL_ENV))?,
                )?,
                api_key: get(GOTRUE_API_KEY_ENV).ok_or(ConfigError::Missing(GOTRUE_API_KEY_ENV))?,
            },
            Some(other) => {
                return Err(invalid(
                    IDENTITY_PROVIDER_ENV,
                    format!("expected `local` or `gotrue`, got `{other}`"),
                ))
            }
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|f| f.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            data_dir,
            bind_addr,
            public_base_url,
            bucket,
            url_policy,
            url_signing_secret,
            session_secret,
            session_ttl,
            identity_provider,
            seed_admin_user_id: get(SEED_ADMIN_USER_ID_ENV).map(|id| id.trim().to_string()),
            log_format,
        })
    }
}
