//! Digest construction for the log collator.
//!
//! This crate provides:
//! - `HashInput`: ordered, colon-joined digest tuples with null omission
//! - Canonicalization of phone numbers, SMS addresses and package names
//! - JSON text in the layout persisted hashes and export files depend on
//!
//! Every digest produced here is persisted and compared against later
//! uploads, so output must stay byte-for-byte stable across releases.

pub mod canonicalize;
pub mod hash;
pub mod json_compat;

pub use canonicalize::{normalize_package_name, normalize_phone_number};
pub use hash::{md5_hex, render_bool, render_datetime, HashInput, HashPart};
pub use json_compat::{to_compat_string, CompatFormatter};
