//! Identifier and secret generation.
//!
//! Row ids are UUIDv7 so they sort by creation time. Secrets (session tokens,
//! CSRF tokens, one-time tokens) come from the thread-local CSPRNG and are
//! never derived from one another.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Generate a random alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a random string of `len` decimal digits.
pub fn random_digits(len: usize) -> String {
    let mut rng = rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
