//! Error types for the log collator.
//!
//! Errors carry:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for the retry/dead-letter policy of the caller
//! - Remediation suggestions for humans
//!
//! A missing prior artifact is not an error and never reaches this type; the
//! engine treats it as empty state.
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 20,
//!   "category": "upload",
//!   "message": "malformed upload for user 100 on device 1 (uploads/users/100/s/1/call_log/f): expected value at line 1 column 1",
//!   "recoverable": false,
//!   "suggested_action": "dead_letter",
//!   "context": { "user_id": 100, "device_id": "1" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for collator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and argument errors.
    Config,
    /// Upload body and upload location errors.
    Upload,
    /// Object store errors.
    Storage,
    /// Row-store encode/decode errors.
    Codec,
    /// Local I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Upload => write!(f, "upload"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for the caller to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the invocation (possibly with backoff).
    Retry,
    /// Park the upload on a dead-letter queue for investigation.
    DeadLetter,
    /// Fix configuration or arguments and rerun.
    FixConfig,
    /// Skip this upload.
    Skip,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::DeadLetter => write!(f, "dead_letter"),
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for the log collator.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Upload errors (20-29)
    #[error("malformed upload for user {user_id} on device {device_id} ({location}): {reason}")]
    MalformedUpload {
        user_id: i64,
        device_id: String,
        location: String,
        reason: String,
    },

    #[error("raw {log_type} entry is missing required field '{field}'")]
    MissingField {
        log_type: &'static str,
        field: &'static str,
    },

    #[error("upload key does not match uploads/users/<user>/<serial>/<device>/<log_type>/<file>: {0}")]
    InvalidUploadKey(String),

    #[error("unsupported log type: '{0}'")]
    UnsupportedLogType(String),

    // Storage errors (30-39)
    #[error("storage error for key {key}: {reason}")]
    Storage { key: String, reason: String },

    // Codec errors (40-49)
    #[error("row-store codec error for key {key}: {reason}")]
    Codec { key: String, reason: String },

    #[error("export rendering failed: {0}")]
    Export(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Upload errors
    /// - 30-39: Storage errors
    /// - 40-49: Codec errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidArgument(_) => 11,
            Error::MalformedUpload { .. } => 20,
            Error::MissingField { .. } => 21,
            Error::InvalidUploadKey(_) => 22,
            Error::UnsupportedLogType(_) => 23,
            Error::Storage { .. } => 30,
            Error::Codec { .. } => 40,
            Error::Export(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidArgument(_) => ErrorCategory::Config,

            Error::MalformedUpload { .. }
            | Error::MissingField { .. }
            | Error::InvalidUploadKey(_)
            | Error::UnsupportedLogType(_) => ErrorCategory::Upload,

            Error::Storage { .. } => ErrorCategory::Storage,

            Error::Codec { .. } | Error::Export(_) => ErrorCategory::Codec,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether re-running the same invocation may succeed.
    ///
    /// Upload errors are deterministic: the same body fails the same way.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidArgument(_) => true,

            Error::MalformedUpload { .. } => false,
            Error::MissingField { .. } => false,
            Error::InvalidUploadKey(_) => false,
            Error::UnsupportedLogType(_) => false,

            // Transient store failures are the common case
            Error::Storage { .. } => true,

            Error::Codec { .. } => false,
            Error::Export(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns the suggested action for the caller.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidArgument(_) => SuggestedAction::FixConfig,

            Error::MalformedUpload { .. } | Error::MissingField { .. } => {
                SuggestedAction::DeadLetter
            }
            Error::InvalidUploadKey(_) | Error::UnsupportedLogType(_) => SuggestedAction::Skip,

            Error::Storage { .. } => SuggestedAction::Retry,

            Error::Codec { .. } | Error::Export(_) => SuggestedAction::ManualIntervention,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check collator.json syntax and the LC_* environment variables.",
            Error::InvalidArgument(_) => "Run 'lc-core --help' for the expected arguments.",

            Error::MalformedUpload { .. } => {
                "The upload body is not a JSON array after optional gunzip. Inspect the raw upload; re-delivery will fail the same way."
            }
            Error::MissingField { .. } => {
                "A device uploaded an entry without its natural key. Inspect the raw upload and the client version."
            }
            Error::InvalidUploadKey(_) => {
                "Uploads must live under uploads/users/<user>/<serial>/<device>/<log_type>/<file>."
            }
            Error::UnsupportedLogType(_) => {
                "Supported log types are sms_log, call_log, contact_list and app_packages."
            }

            Error::Storage { .. } => {
                "The object store rejected a read or write. Retry; artifacts are rewritten in full on every run."
            }

            Error::Codec { .. } => {
                "A persisted artifact could not be decoded. Inspect it with 'lc-core show' and restore from a backup if corrupted."
            }
            Error::Export(_) => "Export rendering failed. Rerun with --no-export to persist the collated state.",

            Error::Io(_) => "Check disk space and permissions on the store root. Retry the operation.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or restore from backup.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidArgument(_) => "Invalid Argument",
            Error::MalformedUpload { .. } => "Malformed Upload",
            Error::MissingField { .. } => "Missing Required Field",
            Error::InvalidUploadKey(_) => "Invalid Upload Key",
            Error::UnsupportedLogType(_) => "Unsupported Log Type",
            Error::Storage { .. } => "Storage Error",
            Error::Codec { .. } => "Artifact Codec Error",
            Error::Export(_) => "Export Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for the caller.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., user id, artifact key).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::MalformedUpload {
                user_id,
                device_id,
                location,
                ..
            } => {
                context.insert("user_id".to_string(), serde_json::json!(user_id));
                context.insert("device_id".to_string(), serde_json::json!(device_id));
                context.insert("location".to_string(), serde_json::json!(location));
            }
            Error::MissingField { log_type, field } => {
                context.insert("log_type".to_string(), serde_json::json!(log_type));
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::Storage { key, .. } | Error::Codec { key, .. } => {
                context.insert("key".to_string(), serde_json::json!(key));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed() -> Error {
        Error::MalformedUpload {
            user_id: 100,
            device_id: "1".to_string(),
            location: "uploads/users/100/s/1/sms_log/f".to_string(),
            reason: "expected value".to_string(),
        }
    }

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(malformed().code(), 20);
        assert_eq!(
            Error::Storage {
                key: "k".into(),
                reason: "r".into()
            }
            .code(),
            30
        );
        assert_eq!(
            Error::Codec {
                key: "k".into(),
                reason: "r".into()
            }
            .code(),
            40
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(malformed().category(), ErrorCategory::Upload);
        assert_eq!(
            Error::UnsupportedLogType("x".into()).category(),
            ErrorCategory::Upload
        );
        assert_eq!(Error::Export("x".into()).category(), ErrorCategory::Codec);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(!malformed().is_recoverable());
        assert!(Error::Storage {
            key: "k".into(),
            reason: "timeout".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_suggested_action() {
        assert_eq!(malformed().suggested_action(), SuggestedAction::DeadLetter);
        assert_eq!(
            Error::InvalidUploadKey("a/b".into()).suggested_action(),
            SuggestedAction::Skip
        );
    }

    #[test]
    fn test_structured_error_from_error() {
        let structured = StructuredError::from(&malformed());
        assert_eq!(structured.code, 20);
        assert_eq!(structured.category, ErrorCategory::Upload);
        assert!(!structured.recoverable);
        assert_eq!(structured.context["user_id"], serde_json::json!(100));
        assert_eq!(structured.context["device_id"], serde_json::json!("1"));

        let json = structured.with_context("run_id", "run-abc").to_json();
        assert!(json.contains("\"suggested_action\":\"dead_letter\""));
        assert!(json.contains("run-abc"));
    }

    #[test]
    fn test_error_message_includes_location() {
        let msg = malformed().to_string();
        assert!(msg.contains("user 100"));
        assert!(msg.contains("device 1"));
        assert!(msg.contains("uploads/users/100/s/1/sms_log/f"));
    }
}
