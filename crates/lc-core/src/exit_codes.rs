//! Exit codes for the lc-core CLI.
//!
//! Exit codes communicate the outcome to the queue worker that invoked the
//! binary without requiring output parsing.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: Input errors (retrying the same input will fail again)
//! - 20-29: Internal and environment errors (may succeed on retry)

use lc_common::{Error, ErrorCategory};

/// Exit codes for lc-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    // ========================================================================
    // Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Upload body or location could not be processed
    UploadError = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal or codec error
    InternalError = 20,

    /// Object store or local I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is an input error (codes 10-19).
    /// Re-delivering the same upload will not help.
    pub fn is_input_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::UploadError => "ERR_UPLOAD",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for a collator error.
    pub fn for_error(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Config => ExitCode::ArgsError,
            ErrorCategory::Upload => ExitCode::UploadError,
            ErrorCategory::Codec => ExitCode::InternalError,
            ErrorCategory::Storage | ErrorCategory::Io => match err {
                Error::Json(_) => ExitCode::InternalError,
                _ => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::UploadError.as_i32(), 11);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn test_for_error() {
        let malformed = Error::MalformedUpload {
            user_id: 1,
            device_id: "d".into(),
            location: "l".into(),
            reason: "r".into(),
        };
        assert_eq!(ExitCode::for_error(&malformed), ExitCode::UploadError);
        assert_eq!(
            ExitCode::for_error(&Error::Config("x".into())),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Storage {
                key: "k".into(),
                reason: "r".into()
            }),
            ExitCode::IoError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Codec {
                key: "k".into(),
                reason: "r".into()
            }),
            ExitCode::InternalError
        );
        assert!(ExitCode::UploadError.is_input_error());
        assert!(!ExitCode::IoError.is_input_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::UploadError.to_string(), "ERR_UPLOAD (11)");
    }
}
