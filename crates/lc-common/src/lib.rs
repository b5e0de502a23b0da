//! Log collator common types and errors.
//!
//! This crate provides the foundational types shared by the collator crates:
//! - The closed set of supported log types
//! - The canonical collated record and its per-type fields
//! - The unified error type with stable codes

pub mod entry;
pub mod error;
pub mod log_type;

pub use entry::{
    AppPackageFields, CallFields, CollatedEntry, ContactFields, EntryDetail, SmsFields,
};
pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use log_type::LogType;
