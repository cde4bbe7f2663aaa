use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime given to signatures whose factory does not state one.
pub const DEFAULT_SIGNATURE_TTL_SECS: i64 = 4 * 60 * 60;

/// A short-lived authentication signature computed per login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signature: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signed_peer_ids: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl Signature {
    pub fn new(
        signature: impl Into<String>,
        timestamp: i64,
        nonce: impl Into<String>,
        signed_peer_ids: Vec<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            timestamp,
            nonce: nonce.into(),
            signed_peer_ids,
            expires_at: Utc::now() + Duration::seconds(DEFAULT_SIGNATURE_TTL_SECS),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A session token handed out by the server on a successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Builds a token that expires `ttl_secs` from now. A TTL beyond the
    /// representable range saturates at the far end of the calendar.
    pub fn with_ttl(token: impl Into<String>, ttl_secs: i64) -> Self {
        let expires_at = TimeDelta::try_seconds(ttl_secs)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(if ttl_secs > 0 {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            });
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.trim().is_empty() && now < self.expires_at
    }
}
