// src/slack/signature.rs — Request signing for the Events API webhook
//
// Slack signs `v0:{timestamp}:{body}` with HMAC-SHA256 under the app's
// signing secret and sends `v0=<hex>` in `X-Slack-Signature`.

use sha2::{Digest, Sha256};

/// Maximum accepted clock skew between Slack and us.
pub const MAX_SKEW_SECS: u64 = 60 * 5;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature headers")]
    MissingHeaders,
    #[error("malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the accepted window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Check a request against the signing secret. `now` is unix seconds.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(SignatureError::MissingHeaders);
    };
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if ts < 0 {
        return Err(SignatureError::BadTimestamp);
    }
    match now.checked_sub(ts).map(i64::unsigned_abs) {
        Some(skew) if skew <= MAX_SKEW_SECS => {}
        _ => return Err(SignatureError::Stale),
    }

    let expected = sign(signing_secret, timestamp.trim(), body);
    if constant_time_eq(signature.trim().as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// `v0=<hex hmac>` for the given timestamp and body.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut base = format!("v0:{timestamp}:").into_bytes();
    base.extend_from_slice(body);
    format!(
        "v0={}",
        hex::encode(hmac_sha256(signing_secret.as_bytes(), &base))
    )
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    const BLOCK_SIZE: usize = 64;

    let key = if key.len() > BLOCK_SIZE {
        Sha256::digest(key).to_vec()
    } else {
        key.to_vec()
    };

    let mut k_ipad = [0x36u8; BLOCK_SIZE];
    let mut k_opad = [0x5cu8; BLOCK_SIZE];
    for (i, &b) in key.iter().enumerate() {
        k_ipad[i] ^= b;
        k_opad[i] ^= b;
    }

    let inner = Sha256::new().chain_update(k_ipad).chain_update(data).finalize();
    Sha256::new()
        .chain_update(k_opad)
        .chain_update(inner)
        .finalize()
        .into()
}

/// Constant-time byte comparison.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
