//! Signature verification of a parameter set.
//!
//! `vnp_verify()` answers "did the holder of this secret sign these
//! parameters?". It has three outcomes, not two:
//!
//! | Outcome | When |
//! |---------|------|
//! | `Verified` | Key supplied, digest present, digests equal (case-insensitive) |
//! | `Mismatched` | Key supplied, digest absent or different |
//! | `NotAttempted` | No key supplied; nothing is claimed either way |
//!
//! Callers must not treat `NotAttempted` as a failure or as a success.
//!
//! ## Execution Order
//!
//! 1. No key → `NotAttempted` (nothing requiring the key is computed)
//! 2. Canonicalize (reserved keys dropped)
//! 3. HMAC-SHA512 → computed digest
//! 4. Compare with `vnp_SecureHash` from the original set

use serde::Serialize;
use tracing::debug;

use crate::canonicalize::vnp_canonicalize;
use crate::compare::vnp_digest_eq;
use crate::errors::VnpError;
use crate::params::{ParameterSet, SECURE_HASH_KEY};
use crate::sign::{vnp_sign, SecretKey};

/// Verdict of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOutcome {
    Verified,
    Mismatched,
    NotAttempted,
}

impl SignatureOutcome {
    /// `Some(true)` / `Some(false)` when a check ran, `None` otherwise.
    pub fn as_option(&self) -> Option<bool> {
        match self {
            SignatureOutcome::Verified => Some(true),
            SignatureOutcome::Mismatched => Some(false),
            SignatureOutcome::NotAttempted => None,
        }
    }
}

/// Result of [`vnp_verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureResult {
    /// Digest computed locally. `None` when no key was supplied.
    pub computed_digest: Option<String>,
    /// Value of `vnp_SecureHash` in the input, if any.
    pub supplied_digest: Option<String>,
    /// The exact string that was signed. `None` when no key was supplied.
    pub canonical: Option<String>,
    pub outcome: SignatureOutcome,
}

impl SignatureResult {
    pub fn is_verified(&self) -> bool {
        self.outcome == SignatureOutcome::Verified
    }
}

/// Verify the `vnp_SecureHash` carried inside `params`.
///
/// A missing or blank key gives [`SignatureOutcome::NotAttempted`].
///
/// # Errors
///
/// Only `VNP_CRYPTO_FAILURE`, propagated from the signer.
///
/// # Example
///
/// ```rust
/// use vnpcore::{vnp_sign_params, vnp_verify, ParameterSet, SecretKey, SignatureOutcome};
///
/// let key = SecretKey::new("SECRETKEY1");
/// let mut params = ParameterSet::from([("vnp_Amount", "1000000"), ("vnp_TxnRef", "5")]);
/// let digest = vnp_sign_params(&params, &key).unwrap();
/// params.insert("vnp_SecureHash", digest.to_uppercase());
///
/// assert_eq!(vnp_verify(&params, Some(&key)).unwrap().outcome, SignatureOutcome::Verified);
/// assert_eq!(vnp_verify(&params, None).unwrap().outcome, SignatureOutcome::NotAttempted);
/// ```
pub fn vnp_verify(
    params: &ParameterSet,
    key: Option<&SecretKey>,
) -> Result<SignatureResult, VnpError> {
    let supplied_digest = params.get(SECURE_HASH_KEY).map(str::to_string);

    let Some(key) = key.filter(|k| !k.is_blank()) else {
        return Ok(SignatureResult {
            computed_digest: None,
            supplied_digest,
            canonical: None,
            outcome: SignatureOutcome::NotAttempted,
        });
    };

    let canonical = vnp_canonicalize(params);
    let computed = vnp_sign(&canonical, key)?;

    let outcome = match supplied_digest.as_deref() {
        Some(supplied) if vnp_digest_eq(supplied, &computed) => SignatureOutcome::Verified,
        _ => SignatureOutcome::Mismatched,
    };
    debug!(canonical = %canonical, computed = %computed, ?outcome, "signature checked");

    Ok(SignatureResult {
        computed_digest: Some(computed),
        supplied_digest,
        canonical: Some(canonical),
        outcome,
    })
}
