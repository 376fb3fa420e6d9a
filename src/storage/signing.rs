// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 signatures for time-limited object URLs.
//!
//! A signed URL carries `expires` (unix seconds) and `signature`
//! (unpadded base64url of `HMAC(secret, "{bucket}/{key}:{expires}")`).

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a signed URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signed URL has expired")]
    Expired,
    #[error("signature is malformed")]
    Malformed,
    #[error("signature does not match")]
    Mismatch,
}

/// Signs and verifies object URLs with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Arc<[u8]>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self, bucket: &str, key: &str, expires: i64) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(format!("{bucket}/{key}:{expires}").as_bytes());
        mac
    }

    /// Compute `(expires, signature)` for an object valid for `ttl` from `now`.
    pub fn sign(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> (i64, String) {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = now.timestamp().saturating_add(ttl_secs);
        let tag = self.mac(bucket, key, expires).finalize().into_bytes();
        (expires, Base64UrlUnpadded::encode_string(&tag))
    }

    /// Verify a signature presented on an object request.
    pub fn verify(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        if expires < now.timestamp() {
            return Err(SignatureError::Expired);
        }

        let tag = Base64UrlUnpadded::decode_vec(signature).map_err(|_| SignatureError::Malformed)?;
        self.mac(bucket, key, expires)
            .verify_slice(&tag)
            .map_err(|_| SignatureError::Mismatch)
    }
}
