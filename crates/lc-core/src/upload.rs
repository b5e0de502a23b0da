//! Upload decoding and upload location parsing.
//!
//! Devices upload a JSON array of entry objects, usually gzip-compressed.
//! Uploads land at `uploads/users/{user}/{serial}/{device}/{log_type}/{file}`.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::GzDecoder;
use lc_common::{Error, LogType, Result};
use serde::{Deserialize, Serialize};

use crate::logging::event_names;

/// One uploaded entry: field name to JSON value, in upload order.
pub type RawEntry = serde_json::Map<String, serde_json::Value>;

/// Gunzip `body`, or return it unchanged if it does not decompress.
pub fn decompress(body: &[u8]) -> Cow<'_, [u8]> {
    let mut decoder = GzDecoder::new(body);
    let mut out = Vec::with_capacity(body.len().saturating_mul(4));
    match decoder.read_to_end(&mut out) {
        Ok(_) => Cow::Owned(out),
        Err(err) => {
            tracing::debug!(
                event = event_names::UPLOAD_NOT_GZIP,
                error = %err,
                "upload body is not gzip; reading as plain text"
            );
            Cow::Borrowed(body)
        }
    }
}

/// Decode an upload body into raw entries.
///
/// `location` only feeds the error message.
pub fn parse_upload(
    body: &[u8],
    user_id: i64,
    device_id: &str,
    location: &str,
) -> Result<Vec<RawEntry>> {
    let text = decompress(body);
    serde_json::from_slice::<Vec<RawEntry>>(&text).map_err(|e| Error::MalformedUpload {
        user_id,
        device_id: device_id.to_string(),
        location: location.to_string(),
        reason: e.to_string(),
    })
}

/// Parsed upload location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadKey {
    pub key: String,
    pub user_id: i64,
    pub device_serial: String,
    pub device_id: String,
    pub log_type: LogType,
    pub file_name: String,
}

impl UploadKey {
    /// Split a 7-segment upload key into its parts.
    pub fn parse(key: &str) -> Result<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        let [root, users, user, serial, device, log_type, file] = segments.as_slice() else {
            return Err(Error::InvalidUploadKey(key.to_string()));
        };
        if *root != "uploads" || *users != "users" || device.is_empty() || file.is_empty() {
            return Err(Error::InvalidUploadKey(key.to_string()));
        }
        let user_id = user
            .parse::<i64>()
            .map_err(|_| Error::InvalidUploadKey(key.to_string()))?;
        let log_type = log_type.parse::<LogType>()?;

        Ok(UploadKey {
            key: key.to_string(),
            user_id,
            device_serial: serial.to_string(),
            device_id: device.to_string(),
            log_type,
            file_name: file.to_string(),
        })
    }
}

/// Object keys named by a storage notification.
///
/// Accepts both a bare notification (`{"Records": [{"s3": ...}]}`) and one
/// relayed through a topic, where each record carries the bare notification
/// as JSON text under `Sns.Message`.
pub fn keys_from_notification(notification: &serde_json::Value) -> Result<Vec<String>> {
    let records = notification
        .get("Records")
        .and_then(|r| r.as_array())
        .ok_or_else(|| Error::InvalidArgument("notification has no Records array".to_string()))?;

    let mut keys = Vec::new();
    for record in records {
        if let Some(message) = record.pointer("/Sns/Message").and_then(|m| m.as_str()) {
            let inner: serde_json::Value = serde_json::from_str(message)?;
            keys.extend(keys_from_notification(&inner)?);
            continue;
        }
        let key = record
            .pointer("/s3/object/key")
            .and_then(|k| k.as_str())
            .ok_or_else(|| {
                Error::InvalidArgument("notification record has no s3.object.key".to_string())
            })?;
        keys.push(key.to_string());
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decompress_gzip_and_plain() {
        let plain = br#"[{"package_name": "app.one"}]"#;
        assert_eq!(decompress(&gzip(plain)).as_ref(), plain);
        assert_eq!(decompress(plain).as_ref(), plain);
    }

    #[test]
    fn test_parse_upload_preserves_field_order() {
        let body = gzip(br#"[{"z": 1, "a": 2}]"#);
        let entries = parse_upload(&body, 100, "1", "loc").unwrap();
        let keys: Vec<&String> = entries[0].keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_parse_upload_malformed() {
        let err = parse_upload(b"{not json", 100, "dev", "uploads/users/100/s/dev/sms_log/f")
            .unwrap_err();
        match err {
            Error::MalformedUpload {
                user_id,
                device_id,
                location,
                ..
            } => {
                assert_eq!(user_id, 100);
                assert_eq!(device_id, "dev");
                assert_eq!(location, "uploads/users/100/s/dev/sms_log/f");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // An object instead of an array is malformed too
        assert!(parse_upload(b"{}", 1, "d", "l").is_err());
    }

    #[test]
    fn test_upload_key_parse() {
        let key = UploadKey::parse("uploads/users/123/serial-9/456/call_log/1528236605.json.gz")
            .unwrap();
        assert_eq!(key.user_id, 123);
        assert_eq!(key.device_serial, "serial-9");
        assert_eq!(key.device_id, "456");
        assert_eq!(key.log_type, LogType::Call);
        assert_eq!(key.file_name, "1528236605.json.gz");
    }

    #[test]
    fn test_upload_key_rejects_other_shapes() {
        for key in [
            "uploads/users/123/456/call_log/file",
            "uploads/users/123/s/456/call_log/file/extra",
            "other/users/123/s/456/call_log/file",
            "uploads/users/abc/s/456/call_log/file",
        ] {
            assert!(
                matches!(UploadKey::parse(key), Err(Error::InvalidUploadKey(_))),
                "{key}"
            );
        }
        assert!(matches!(
            UploadKey::parse("uploads/users/1/s/2/browser_history/f"),
            Err(Error::UnsupportedLogType(_))
        ));
    }

    #[test]
    fn test_keys_from_notification() {
        let direct = serde_json::json!({
            "Records": [{"s3": {"object": {"key": "uploads/users/1/s/2/sms_log/a"}}}]
        });
        assert_eq!(
            keys_from_notification(&direct).unwrap(),
            vec!["uploads/users/1/s/2/sms_log/a"]
        );

        let relayed = serde_json::json!({
            "Records": [{"Sns": {"Message": direct.to_string()}}]
        });
        assert_eq!(
            keys_from_notification(&relayed).unwrap(),
            vec!["uploads/users/1/s/2/sms_log/a"]
        );

        assert!(keys_from_notification(&serde_json::json!({})).is_err());
    }
}
