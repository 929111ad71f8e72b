//! Unverified JWT claim decoding.
//!
//! The client never holds the signing key; it only reads `exp` and the
//! identity claims from the payload segment. Signature checks stay with the
//! backend.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use tracing::debug;

use crate::error::{FedrlError, Result};
use crate::models::UserData;

/// Decode the payload segment of a JWT into its claims.
pub fn decode_claims(token: &str) -> Result<UserData> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_header), Some(payload)) if !payload.is_empty() => payload,
        _ => return Err(FedrlError::InvalidToken("missing payload segment".to_string())),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| FedrlError::InvalidToken(format!("payload is not base64url: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| FedrlError::InvalidToken(format!("payload is not a claims object: {}", e)))
}

/// Whether `token` is expired at `now` (epoch seconds).
///
/// Undecodable tokens and tokens without an `exp` claim count as expired.
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => match claims.exp {
            Some(exp) => exp < now as f64,
            None => true,
        },
        Err(e) => {
            debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

pub fn is_access_token_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}

/// Build an unsigned token carrying `claims`, for tests and local stubs.
pub fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.", header, payload)
}
