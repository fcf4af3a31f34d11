//! SHA256 + base36 document id generation.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Shortest id suffix handed out.
pub const MIN_ID_LENGTH: usize = 6;
/// Longest id suffix; collisions past this length are reported by storage.
pub const MAX_ID_LENGTH: usize = 8;

/// Converts a byte slice to a base36 string of exactly `length` chars,
/// zero-padded on the left and keeping the least significant digits.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(36u32);

    let mut digits: Vec<char> = Vec::with_capacity(length);
    while !num.is_zero() {
        let rem = &num % &base;
        num /= &base;
        let i = rem.to_u32_digits().first().copied().unwrap_or(0) as usize;
        digits.push(BASE36_ALPHABET[i] as char);
    }
    while digits.len() < length {
        digits.push('0');
    }
    digits.truncate(length);
    digits.iter().rev().collect()
}

/// Creates a hash-based id such as `doc-k3x9qa`.
///
/// `nonce` is bumped by the caller to resolve collisions; `length` is
/// clamped to [`MIN_ID_LENGTH`]..=[`MAX_ID_LENGTH`].
pub fn generate_document_id(
    prefix: &str,
    title: &str,
    creator: &str,
    timestamp: DateTime<Utc>,
    length: usize,
    nonce: u32,
) -> String {
    let content = format!(
        "{}|{}|{}|{}",
        title,
        creator,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        nonce
    );
    let hash = Sha256::digest(content.as_bytes());

    let length = length.clamp(MIN_ID_LENGTH, MAX_ID_LENGTH);
    // 6 bytes = 48 bits, enough for 9 base36 digits.
    let short_hash = encode_base36(&hash[..6], length);
    format!("{prefix}-{short_hash}")
}
