//! Random codes handed out to users: license keys, order numbers, bank
//! transfer memos and deactivation OTPs.
//!
//! None of these check uniqueness; callers generate, look up and retry.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::prelude::*;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PREFIX: &str = "VEO3";

static LICENSE_KEY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}$")
    .expect("static license key pattern")
});

fn random_chars(len: usize) -> String {
  let mut rng = rand::thread_rng();
  (0..len)
    .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
    .collect()
}

/// `XXXX-XXXX-XXXX-XXXX` over `[A-Z0-9]`.
pub fn license_key() -> String {
  (0..4).map(|_| random_chars(4)).collect::<Vec<_>>().join("-")
}

/// Cheap shape check done before any lookup.
pub fn is_valid_license_key(key: &str) -> bool {
  LICENSE_KEY.is_match(key)
}

/// `VEO3-YYYYMMDD-XXXX`
pub fn order_number(now: DateTime) -> String {
  format!("{PREFIX}-{}-{}", now.format("%Y%m%d"), random_chars(4))
}

/// Memo the payer puts on the bank transfer, `VEO3` + 8 chars.
pub fn transfer_content() -> String {
  format!("{PREFIX}{}", random_chars(8))
}

/// Six digit numeric code.
pub fn otp() -> String {
  rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}
