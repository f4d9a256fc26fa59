//! Backup password policy.
//!
//! A password is bad when it is shorter than eight characters, one
//! character repeated (case-insensitive), all digits up to fifteen digits
//! long, or appears verbatim in the deny-list file. Sixteen or more digits
//! pass the digit rule deliberately; length makes up for the tiny
//! alphabet.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use msgsafe_core::SafeResult;

const MIN_LENGTH: usize = 8;
const MAX_DIGIT_ONLY_LENGTH: usize = 15;

/// Check a candidate backup password against the policy.
///
/// The deny list is streamed line by line and compared case-sensitively;
/// a missing file disables that rule rather than failing the check.
pub fn is_password_bad(password: &str, deny_list: Option<&Path>) -> SafeResult<bool> {
    if password.chars().count() < MIN_LENGTH {
        return Ok(true);
    }
    if is_single_repeated_char(password) {
        return Ok(true);
    }
    if is_digits_only(password) {
        return Ok(true);
    }
    if let Some(path) = deny_list {
        if in_deny_list(password, path)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_single_repeated_char(password: &str) -> bool {
    let mut chars = password.chars().map(|c| c.to_ascii_lowercase());
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => false,
    }
}

fn is_digits_only(password: &str) -> bool {
    !password.is_empty()
        && password.len() <= MAX_DIGIT_ONLY_LENGTH
        && password.bytes().all(|b| b.is_ascii_digit())
}

fn in_deny_list(password: &str, path: &Path) -> SafeResult<bool> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    for line in BufReader::new(file).lines() {
        if line? == password {
            return Ok(true);
        }
    }
    Ok(false)
}
