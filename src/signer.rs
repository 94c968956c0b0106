//! Request signing.
//!
//! Every exchange call carries a form body built from its parameters:
//! unset values are dropped, keys are sorted bytewise, each key and value
//! is percent-encoded, and the pairs are joined with `&`. A millisecond
//! `timestamp` is injected at signing time and the canonical string is
//! signed with Ed25519. The base64 signature is appended as a trailing
//! `signature` field.
//!
//! The signing key is derived once from the configured 32-byte seed when
//! the signer is constructed and is read-only afterwards.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Length of the private signing seed in bytes.
pub const SEED_LEN: usize = 32;

/// Message signed by [`RequestSigner::self_test`].
const SELF_TEST_MESSAGE: &str = "mmsim-self-test&timestamp=0";

/// Millisecond clock used for the `timestamp` field.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Signing seed is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Signing seed must be 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Signer self-test failed: {0}")]
    SelfTest(String),
}

// ---------------------------------------------------------------------------
// Canonical encoding
// ---------------------------------------------------------------------------

/// Build the canonical query string for a parameter set.
///
/// Entries with a `None` value are dropped. The result does not depend on
/// the input order.
pub fn canonicalize<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut entries: Vec<(K, V)> = params
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();
    entries.sort_by(|a, b| a.0.as_ref().as_bytes().cmp(b.0.as_ref().as_bytes()));

    entries
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k.as_ref()),
                urlencoding::encode(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Check a base64 signature against a message.
pub fn verify(key: &VerifyingKey, message: &str, signature_b64: &str) -> bool {
    let Ok(bytes) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(message.as_bytes(), &signature).is_ok()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Ed25519 request signer holding the derived key.
#[derive(Clone)]
pub struct RequestSigner {
    key: SigningKey,
    clock: Clock,
}

impl RequestSigner {
    /// Derive the signer from a hex-encoded 32-byte seed.
    pub fn from_hex(seed_hex: &str) -> Result<Self, SignerError> {
        let trimmed = seed_hex.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)?;
        let seed: [u8; SEED_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignerError::InvalidLength(bytes.len()))?;
        Ok(Self::from_seed(seed))
    }

    pub fn from_seed(seed: [u8; SEED_LEN]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
            clock: Arc::new(now_ms),
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Sign a message, returning the base64 signature.
    pub fn sign(&self, message: &str) -> String {
        let signature = self.key.sign(message.as_bytes());
        BASE64.encode(signature.to_bytes())
    }

    /// Sign and verify a probe message. Run once before trading starts.
    pub fn self_test(&self) -> Result<(), SignerError> {
        let signature = self.sign(SELF_TEST_MESSAGE);
        if verify(&self.verifying_key(), SELF_TEST_MESSAGE, &signature) {
            Ok(())
        } else {
            Err(SignerError::SelfTest(
                "signature did not verify against derived public key".into(),
            ))
        }
    }

    /// Build a signed form body for one request.
    ///
    /// Must be called per request: the embedded timestamp makes every
    /// payload unique.
    pub fn build_signed_payload<I, K, V>(&self, params: I) -> String
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut owned: Vec<(String, Option<String>)> = params
            .into_iter()
            .filter(|(k, _)| k.as_ref() != "timestamp" && k.as_ref() != "signature")
            .map(|(k, v)| (k.as_ref().to_string(), v.map(|v| v.as_ref().to_string())))
            .collect();
        owned.push(("timestamp".to_string(), Some((self.clock)().to_string())));

        let canonical = canonicalize(owned);
        let signature = self.sign(&canonical);
        format!("{canonical}&signature={}", urlencoding::encode(&signature))
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("public_key", &hex::encode(self.verifying_key().to_bytes()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
