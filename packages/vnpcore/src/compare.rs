//! Digest comparison.
//!
//! Hex digests may arrive in either case, so both sides are lowercased first.
//! The byte comparison itself goes through `subtle`, which keeps the verifier
//! usable on a server boundary where the supplied digest is untrusted.
//!
//! ```rust
//! use vnpcore::vnp_digest_eq;
//!
//! assert!(vnp_digest_eq("ABCDEF01", "abcdef01"));
//! assert!(!vnp_digest_eq("abcdef01", "abcdef02"));
//! assert!(!vnp_digest_eq("abcdef01", "abcdef"));
//! ```

use subtle::ConstantTimeEq;

/// Case-insensitive, constant-time (for equal lengths) digest equality.
///
/// A length difference returns `false` immediately; digest length is public.
pub fn vnp_digest_eq(a: &str, b: &str) -> bool {
    let a = a.trim().to_ascii_lowercase();
    let b = b.trim().to_ascii_lowercase();
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
