//! Canonical string construction and the gateway's value encoding.
//!
//! The canonical string is the exact byte sequence the gateway signs. Getting
//! one byte wrong produces a digest mismatch against the real gateway, so every
//! tool in this crate goes through [`vnp_canonicalize`].
//!
//! ## Canonicalization Rules
//!
//! | Rule | Example |
//! |------|---------|
//! | Reserved keys removed | `vnp_SecureHash`, `vnp_SecureHashType` never signed |
//! | Keys sorted byte-wise | `vnp_TxnRef=5&vnp_Amount=1` → `vnp_Amount=1&vnp_TxnRef=5` |
//! | Values percent-encoded, uppercase hex | `#` → `%23`, `é` → `%C3%A9` |
//! | `! ' ( ) *` always encoded | `(` → `%28` |
//! | Order description spaces become `+` | `vnp_OrderInfo=Pay+now` |
//! | Empty values kept | `vnp_BankCode=` |
//! | Keys are not encoded | |
//!
//! Only `A-Z a-z 0-9 - _ . ~` are left literal in values.
//!
//! ## Example
//!
//! ```rust
//! use vnpcore::{vnp_canonicalize, ParameterSet};
//!
//! let params = ParameterSet::from([
//!     ("vnp_TxnRef", "5"),
//!     ("vnp_Command", "pay"),
//!     ("vnp_Amount", "1000000"),
//!     ("vnp_SecureHash", "ignored"),
//! ]);
//! assert_eq!(
//!     vnp_canonicalize(&params),
//!     "vnp_Amount=1000000&vnp_Command=pay&vnp_TxnRef=5"
//! );
//! ```

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::errors::{InternalReason, VnpError};
use crate::params::{is_reserved_key, ParameterSet, ORDER_INFO_KEY};

/// Build the canonical string for `params`.
///
/// The result depends only on the key/value pairs, never on how the set was
/// assembled. An empty set (or one holding only reserved keys) yields `""`.
pub fn vnp_canonicalize(params: &ParameterSet) -> String {
    let mut out = String::new();
    // ParameterSet iterates in byte-wise key order.
    for (key, value) in params.iter().filter(|(k, _)| !is_reserved_key(k)) {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&vnp_encode_value(key, value));
    }
    out
}

/// Percent-encode a value the way the gateway does before signing.
///
/// Everything outside `A-Z a-z 0-9 - _ . ~` is encoded as `%XX` per UTF-8
/// byte with uppercase hex. This is the standard URI component encoding with
/// `! ' ( ) *` forced into encoded form.
pub fn vnp_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 3);

    for ch in input.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => {
                result.push(ch);
            }
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).as_bytes() {
                    // Writing to a String cannot fail.
                    let _ = write!(result, "%{:02X}", byte);
                }
            }
        }
    }

    result
}

/// Encode the value of `key`, applying the order-description space rule.
///
/// ```rust
/// use vnpcore::vnp_encode_value;
///
/// assert_eq!(
///     vnp_encode_value("vnp_OrderInfo", "Payment for order #123"),
///     "Payment+for+order+%23123"
/// );
/// assert_eq!(vnp_encode_value("vnp_ReturnUrl", "a b"), "a%20b");
/// ```
pub fn vnp_encode_value(key: &str, value: &str) -> String {
    let encoded = vnp_encode(value);
    if key == ORDER_INFO_KEY {
        encoded.replace("%20", "+")
    } else {
        encoded
    }
}

/// Strict percent-decoding. `+` is left alone.
///
/// Fails with `VNP_MALFORMED_INPUT` on a `%` not followed by two hex digits
/// or when the decoded bytes are not UTF-8.
pub fn vnp_percent_decode(input: &str) -> Result<String, VnpError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            match hex {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    return Err(VnpError::malformed(
                        InternalReason::PercentEncoding,
                        "Invalid percent encoding",
                    )
                    .with_detail("position", i.to_string()));
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).map_err(|_| {
        VnpError::malformed(
            InternalReason::InvalidUtf8,
            "Invalid UTF-8 in percent-decoded string",
        )
    })
}

/// Decode a gateway-encoded value: `+` is a space, then strict percent-decoding.
pub fn vnp_decode(input: &str) -> Result<String, VnpError> {
    vnp_percent_decode(&input.replace('+', " "))
}

/// Direction for [`vnp_transcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeDirection {
    Encode,
    Decode,
}

/// Encode or decode free text for inspection.
///
/// Text containing `=` is treated as a query string: each `key=value` pair
/// keeps its key and has only its value transformed (a value may itself
/// contain `=`). The reserved signature keys pass through untouched. Any other
/// text is transformed as a single value.
///
/// ```rust
/// use vnpcore::{vnp_transcode, TranscodeDirection};
///
/// let encoded = vnp_transcode(
///     "vnp_OrderInfo=Pay now&vnp_SecureHash=AB CD",
///     TranscodeDirection::Encode,
/// )
/// .unwrap();
/// assert_eq!(encoded, "vnp_OrderInfo=Pay+now&vnp_SecureHash=AB CD");
///
/// let decoded = vnp_transcode("Thanh%20to%C3%A1n", TranscodeDirection::Decode).unwrap();
/// assert_eq!(decoded, "Thanh toán");
/// ```
pub fn vnp_transcode(input: &str, direction: TranscodeDirection) -> Result<String, VnpError> {
    if !input.contains('=') {
        return match direction {
            TranscodeDirection::Encode => Ok(vnp_encode(input)),
            TranscodeDirection::Decode => vnp_decode(input),
        };
    }

    let mut pairs = Vec::new();
    for pair in input.split('&') {
        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        let value = if is_reserved_key(key) {
            value.to_string()
        } else {
            match direction {
                TranscodeDirection::Encode => vnp_encode_value(key, value),
                TranscodeDirection::Decode => vnp_decode(value)?,
            }
        };
        pairs.push(format!("{}={}", key, value));
    }

    Ok(pairs.join("&"))
}
