//! Password generation.
//!
//! - [`generate_secure_random_password`] draws from the OS CSPRNG
//! - [`random_org::generate_random_org_password`] asks random.org for the
//!   bytes instead

pub mod random_org;

use rand::Rng;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{CryptError, CryptResult};

/// Shortest password the generators will produce.
pub const MIN_PASSWORD_LENGTH: usize = 1;

/// Longest password the generators will produce.
pub const MAX_PASSWORD_LENGTH: usize = 4096;

/// Default password length.
pub const DEFAULT_PASSWORD_LENGTH: usize = 24;

/// `A-Z`, `a-z`, `0-9`, in that order.
pub const STANDARD_SYMBOLS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn standard_symbols() -> Vec<char> {
    STANDARD_SYMBOLS.chars().collect()
}

pub(crate) fn check_length(length: usize) -> CryptResult<()> {
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(CryptError::InvalidParameter(format!(
            "password length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}, got {length}"
        )));
    }
    Ok(())
}

/// Generate a password of `length` characters drawn uniformly from `symbols`.
///
/// # Errors
///
/// [`CryptError::InvalidParameter`] if `length` is outside
/// [`MIN_PASSWORD_LENGTH`]..=[`MAX_PASSWORD_LENGTH`] or `symbols` is empty.
pub fn generate_secure_random_password(
    length: usize,
    symbols: &[char],
) -> CryptResult<Zeroizing<String>> {
    check_length(length)?;
    if symbols.is_empty() {
        return Err(CryptError::InvalidParameter(
            "symbol set must not be empty".into(),
        ));
    }

    let mut rng = OsRng;
    let mut password = Zeroizing::new(String::with_capacity(length));
    for _ in 0..length {
        password.push(symbols[rng.gen_range(0..symbols.len())]);
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_requested_length() {
        let pw = generate_secure_random_password(24, &standard_symbols()).unwrap();
        assert_eq!(pw.chars().count(), 24);
    }

    #[test]
    fn only_uses_given_symbols() {
        let symbols = ['x', 'y', 'é'];
        let pw = generate_secure_random_password(200, &symbols).unwrap();
        assert!(pw.chars().all(|c| symbols.contains(&c)));
    }

    #[test]
    fn every_symbol_is_reachable() {
        // the last symbol of the set must be drawable
        let symbols = ['a', 'b'];
        let pw = generate_secure_random_password(MAX_PASSWORD_LENGTH, &symbols).unwrap();
        let seen: HashSet<char> = pw.chars().collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn length_bounds_are_enforced() {
        let symbols = standard_symbols();
        assert!(generate_secure_random_password(MIN_PASSWORD_LENGTH, &symbols).is_ok());
        assert!(generate_secure_random_password(MAX_PASSWORD_LENGTH, &symbols).is_ok());
        assert!(matches!(
            generate_secure_random_password(0, &symbols),
            Err(CryptError::InvalidParameter(_))
        ));
        assert!(matches!(
            generate_secure_random_password(MAX_PASSWORD_LENGTH + 1, &symbols),
            Err(CryptError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_symbol_set_is_rejected() {
        assert!(matches!(
            generate_secure_random_password(10, &[]),
            Err(CryptError::InvalidParameter(_))
        ));
    }

    #[test]
    fn standard_symbols_are_alphanumeric() {
        let symbols = standard_symbols();
        assert_eq!(symbols.len(), 62);
        assert!(symbols.iter().all(|c| c.is_ascii_alphanumeric()));
    }
}
