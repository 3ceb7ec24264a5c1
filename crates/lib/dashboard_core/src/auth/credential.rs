//! Credential rules: email/password validation and bcrypt hashing.

use lettre::Address;

use super::{AuthError, Result};

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

pub const PASSWORD_MIN_LEN: usize = 8;
/// bcrypt ignores input past 72 bytes.
pub const PASSWORD_MAX_LEN: usize = 72;
pub const EMAIL_MAX_LEN: usize = 128;

/// Case-fold an email address. Done once, before validation and storage.
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

/// Check a plaintext password: 8–72 bytes with a lowercase letter, an
/// uppercase letter and a digit.
pub fn validate_password(password: &str) -> Result<()> {
    let len = password.len();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AuthError::InvalidPassword(format!(
            "length {len} outside {PASSWORD_MIN_LEN}..={PASSWORD_MAX_LEN}"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AuthError::InvalidPassword("missing lowercase letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::InvalidPassword("missing uppercase letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::InvalidPassword("missing digit".into()));
    }
    Ok(())
}

/// Check an email address. It must already be lower-cased and be a single
/// bare address without a display name.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || email.len() > EMAIL_MAX_LEN {
        return Err(AuthError::InvalidEmail(format!(
            "length {} outside 1..={EMAIL_MAX_LEN}",
            email.len()
        )));
    }
    if normalize_email(email) != email {
        return Err(AuthError::InvalidEmail("email is not lower-cased".into()));
    }
    email
        .parse::<Address>()
        .map_err(|e| AuthError::InvalidEmail(format!("unparseable address: {e}")))?;
    Ok(())
}

/// Hash a password with bcrypt (cost 10).
///
/// Input has already passed [`validate_password`], so a failure here is an
/// internal fault rather than a client error.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Compare a plaintext password against a stored hash.
pub fn compare_password(hash: &str, password: &str) -> bool {
    if hash.is_empty() || password.is_empty() {
        return false;
    }
    bcrypt::verify(password, hash).unwrap_or(false)
}
