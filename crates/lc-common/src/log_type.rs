//! The closed set of device log types handled by the collator.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Device log types that can be uploaded and collated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum LogType {
    /// Text messages. Uploads are incremental.
    #[serde(rename = "sms_log")]
    #[value(name = "sms_log")]
    Sms,

    /// Call history. Uploads are full per-device snapshots.
    #[serde(rename = "call_log")]
    #[value(name = "call_log")]
    Call,

    /// Address book. Uploads are full per-device snapshots.
    #[serde(rename = "contact_list")]
    #[value(name = "contact_list")]
    Contact,

    /// Installed application packages. Uploads are full per-device snapshots.
    #[serde(rename = "app_packages")]
    #[value(name = "app_packages")]
    AppPackage,
}

impl LogType {
    /// All supported log types.
    pub const ALL: [LogType; 4] = [
        LogType::Sms,
        LogType::Call,
        LogType::Contact,
        LogType::AppPackage,
    ];

    /// Name used in upload paths and artifact keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Sms => "sms_log",
            LogType::Call => "call_log",
            LogType::Contact => "contact_list",
            LogType::AppPackage => "app_packages",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnsupportedLogType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_type_names() {
        assert_eq!(LogType::Sms.as_str(), "sms_log");
        assert_eq!(LogType::Call.as_str(), "call_log");
        assert_eq!(LogType::Contact.as_str(), "contact_list");
        assert_eq!(LogType::AppPackage.as_str(), "app_packages");
    }

    #[test]
    fn test_log_type_parse() {
        for t in LogType::ALL {
            assert_eq!(t.as_str().parse::<LogType>().unwrap(), t);
        }
        let err = "browser_history".parse::<LogType>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedLogType(ref s) if s == "browser_history"));
    }

    #[test]
    fn test_log_type_serde_uses_path_names() {
        let json = serde_json::to_string(&LogType::AppPackage).unwrap();
        assert_eq!(json, "\"app_packages\"");
        let back: LogType = serde_json::from_str("\"contact_list\"").unwrap();
        assert_eq!(back, LogType::Contact);
    }
}
