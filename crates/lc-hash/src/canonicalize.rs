//! Canonical forms of device-supplied identifiers.
//!
//! Phone numbers and SMS addresses arrive in whatever format the device's
//! dialer or messaging app stored them. Canonicalization removes formatting
//! so the same counterparty hashes the same way across devices.

use once_cell::sync::Lazy;
use regex::Regex;

// Any non-word character, plus underscore.
static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]").unwrap());

/// Lower-case and drop every whitespace character.
fn squash(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Canonical phone number or SMS address.
///
/// `"+254 (729) 477-015"` becomes `"254729477015"`; alphanumeric sender ids
/// such as `"M-PESA"` become `"mpesa"`.
pub fn normalize_phone_number(raw: &str) -> String {
    RE_NON_ALNUM.replace_all(&squash(raw), "").into_owned()
}

/// Canonical application package name.
///
/// Returns `None` when nothing is left, which callers treat as a rejected entry.
pub fn normalize_package_name(raw: &str) -> Option<String> {
    let name = squash(raw);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
