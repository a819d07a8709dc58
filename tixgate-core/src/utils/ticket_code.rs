//! Human-presentable ticket codes.
//!
//! Codes are `TG-` followed by 16 Crockford base32 characters encoding 10
//! random bytes: unambiguous to read out loud, safe in URLs, and with
//! enough entropy that codes are unguessable.

use compact_str::CompactString;

/// Prefix carried by every ticket code.
pub const CODE_PREFIX: &str = "TG-";

/// Length of the random part in bytes (16 Crockford characters).
const CODE_RANDOM_BYTES: usize = 10;

/// Generate a fresh ticket code.
pub fn generate() -> CompactString {
    let bytes: [u8; CODE_RANDOM_BYTES] = rand::random();
    let encoded = fast32::base32::CROCKFORD.encode(&bytes);
    compact_str::format_compact!("{CODE_PREFIX}{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_prefix_and_length() {
        let code = generate();
        assert!(code.starts_with(CODE_PREFIX));
        assert_eq!(code.len(), CODE_PREFIX.len() + 16);
    }

    #[test]
    fn generated_codes_differ() {
        assert_ne!(generate(), generate());
    }
}
