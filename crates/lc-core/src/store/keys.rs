//! Artifact key templates.
//!
//! Downstream consumers locate artifacts by these exact templates.

use lc_common::LogType;

/// Key of the full current artifact for a user and log type.
pub fn current_key(log_type: LogType, user_id: i64) -> String {
    format!("collated/current/{}/user={}/logs", log_type, user_id)
}

/// Key of the diff artifact for one batch window.
pub fn diff_key(log_type: LogType, window_key: &str, user_id: i64) -> String {
    format!(
        "collated/diff/{}/window={}/user={}/logs",
        log_type, window_key, user_id
    )
}

/// Key of the device-scoped export rendering.
pub fn export_key(user_id: i64, device_id: &str, log_type: LogType) -> String {
    format!(
        "collated/export/user-{}/device-{}/{}",
        user_id, device_id, log_type
    )
}

/// The three artifact keys touched by one collation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub current: String,
    pub diff: String,
    pub export: String,
}

impl ArtifactKeys {
    pub fn new(log_type: LogType, user_id: i64, device_id: &str, window_key: &str) -> Self {
        ArtifactKeys {
            current: current_key(log_type, user_id),
            diff: diff_key(log_type, window_key, user_id),
            export: export_key(user_id, device_id, log_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_templates() {
        let keys = ArtifactKeys::new(LogType::Call, 100, "device-1", "2018-06-05");
        assert_eq!(keys.current, "collated/current/call_log/user=100/logs");
        assert_eq!(
            keys.diff,
            "collated/diff/call_log/window=2018-06-05/user=100/logs"
        );
        assert_eq!(
            keys.export,
            "collated/export/user-100/device-device-1/call_log"
        );
    }
}
