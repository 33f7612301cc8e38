//! Keyed digest over the canonical string (HMAC-SHA512).
//!
//! ## Wire Format
//!
//! - MAC: HMAC with SHA-512 (RFC 2104), 64-byte output
//! - Message: UTF-8 bytes of the canonical string
//! - Key: UTF-8 bytes of the merchant secret
//! - Output: 128 lowercase hex characters
//!
//! The secret never leaves this module's computation: it is not logged, not
//! included in errors, and its `Debug` form is redacted.
//!
//! ## Example
//!
//! ```rust
//! use vnpcore::{vnp_sign, SecretKey};
//!
//! let key = SecretKey::new("SECRETKEY1");
//! let digest = vnp_sign("vnp_Amount=1000000&vnp_Command=pay&vnp_TxnRef=5", &key).unwrap();
//! assert_eq!(digest.len(), 128);
//! assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
//! ```

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::canonicalize::vnp_canonicalize;
use crate::errors::VnpError;
use crate::params::ParameterSet;

type HmacSha512 = Hmac<Sha512>;

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 128;

/// Label the gateway uses in `vnp_SecureHashType`.
pub const SECURE_HASH_TYPE: &str = "HmacSHA512";

/// Merchant secret ("hash secret"). Wiped on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// `None` for an empty or whitespace-only secret.
    ///
    /// Tools treat a blank key field as "no key supplied".
    pub fn non_empty(secret: &str) -> Option<Self> {
        if secret.trim().is_empty() {
            None
        } else {
            Some(Self::new(secret))
        }
    }

    /// Empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// HMAC-SHA512 over `canonical`, rendered as lowercase hex.
///
/// # Errors
///
/// `VNP_CRYPTO_FAILURE` if the MAC rejects the key material. There is no
/// fallback for this class of failure.
pub fn vnp_sign(canonical: &str, key: &SecretKey) -> Result<String, VnpError> {
    let mut mac =
        HmacSha512::new_from_slice(key.expose()).map_err(|_| VnpError::crypto_failure())?;
    mac.update(canonical.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Canonicalize `params` and sign the result.
pub fn vnp_sign_params(params: &ParameterSet, key: &SecretKey) -> Result<String, VnpError> {
    vnp_sign(&vnp_canonicalize(params), key)
}
