//! Log Collator Core Library
//!
//! This library provides the core functionality for collating device logs:
//! - The reconciliation engine (load, classify, infer deletions, persist)
//! - Per-log-type profiles: normalization, hash recipes, export rendering
//! - Batch window policy for diff artifacts
//! - Object store abstraction with filesystem and in-memory backends
//! - Upload decoding and upload location parsing
//! - Configuration, structured logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod engine;
pub mod exit_codes;
pub mod logging;
pub mod profile;
pub mod record_set;
pub mod store;
pub mod upload;
pub mod window;

pub use engine::{CollationReport, CollationRequest, ReconciliationEngine};
pub use profile::{profile_for, EntryOrigin, LogProfile};
pub use record_set::RecordSet;
pub use upload::{RawEntry, UploadKey};
pub use window::{window_key, WindowGranularity};
