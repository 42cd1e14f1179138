//! # Access Token Security
//!
//! The single, authoritative implementation of the signed access token that
//! travels inside event payloads. Every service verifies tokens against the
//! same shared secret and then checks its local user replica's session
//! list, so authorization never requires a live call back to the
//! authentication service.
//!
//! ## Properties
//!
//! - **HMAC-SHA256 signatures** over `user_id || issued_at`.
//! - **Constant-time verification** via the `hmac` crate.
//! - **Envelope-carried identity**: the token is the sole proof of the
//!   acting principal; payloads carry no separate caller id.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::entities::UserId;
use crate::MarketError;

type HmacSha256 = Hmac<Sha256>;

/// A signed session token recovered to a principal id on verification.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The principal this token was issued to.
    pub user_id: UserId,
    /// Unix timestamp (seconds) of issuance. Part of the signed message,
    /// so two logins of the same user yield distinct tokens.
    pub issued_at: u64,
    /// HMAC-SHA256 over `user_id || issued_at`.
    #[serde_as(as = "Bytes")]
    pub signature: [u8; 32],
}

impl AccessToken {
    /// The compact string form stored in user session lists.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}",
            self.user_id.simple(),
            self.issued_at,
            hex_encode(&self.signature)
        )
    }
}

/// Signs access tokens with the shared secret. Held by the authentication
/// service only.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issues a token for a user at the current time.
    #[must_use]
    pub fn sign(&self, user_id: UserId) -> AccessToken {
        self.sign_at(user_id, current_timestamp())
    }

    /// Issues a token with an explicit timestamp. Used by tests for
    /// deterministic tokens.
    #[must_use]
    pub fn sign_at(&self, user_id: UserId, issued_at: u64) -> AccessToken {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(&token_message(user_id, issued_at));
        let digest = mac.finalize().into_bytes();
        let mut signature = [0u8; 32];
        signature.copy_from_slice(&digest);
        AccessToken {
            user_id,
            issued_at,
            signature,
        }
    }

    /// A verifier for the same secret.
    #[must_use]
    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(self.secret.clone())
    }
}

/// Verifies access tokens against the shared secret. Held by every service.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Recovers the acting principal from a token.
    ///
    /// Signature verification only; callers additionally check that the
    /// encoded token is present in their local replica's session list.
    pub fn verify(&self, token: &AccessToken) -> Result<UserId, MarketError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| MarketError::Unauthorized("invalid token".into()))?;
        mac.update(&token_message(token.user_id, token.issued_at));
        mac.verify_slice(&token.signature)
            .map_err(|_| MarketError::Unauthorized("invalid token".into()))?;
        Ok(token.user_id)
    }
}

fn token_message(user_id: Uuid, issued_at: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(24);
    message.extend_from_slice(user_id.as_bytes());
    message.extend_from_slice(&issued_at.to_be_bytes());
    message
}

/// Current unix timestamp in seconds. Returns 0 if the clock is before the
/// epoch rather than panicking.
#[must_use]
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
