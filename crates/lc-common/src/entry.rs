//! The canonical collated record.
//!
//! A [`CollatedEntry`] is an immutable value. Updating a logical log item means
//! appending a new entry with the same `identity_id` and a later
//! `last_update_time`; deleting it means appending a tombstone with
//! `is_deleted = true`.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::log_type::LogType;

/// One collated log record for a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollatedEntry {
    /// Stable fingerprint of the item's immutable natural key.
    pub identity_id: String,

    /// Fingerprint of the item's observable state, deletion flag included.
    pub content_hash: String,

    /// Device that uploaded the item.
    pub device_id: String,

    /// Owning user.
    pub user_id: i64,

    /// Tombstone marker.
    pub is_deleted: bool,

    /// Processing time at which this version was produced.
    pub last_update_time: NaiveDateTime,

    /// Type-specific fields.
    #[serde(flatten)]
    pub detail: EntryDetail,
}

impl CollatedEntry {
    /// Log type of this entry, derived from its detail variant.
    pub fn log_type(&self) -> LogType {
        self.detail.log_type()
    }

    /// Natural item id assigned by the device, if the type has one.
    pub fn item_id(&self) -> Option<i64> {
        match &self.detail {
            EntryDetail::Sms(f) => Some(f.item_id),
            EntryDetail::Call(f) => Some(f.item_id),
            EntryDetail::Contact(f) => Some(f.item_id),
            EntryDetail::AppPackage(_) => None,
        }
    }

    /// Event timestamp of the item (message or call time), if the type has one.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        match &self.detail {
            EntryDetail::Sms(f) => f.datetime,
            EntryDetail::Call(f) => f.datetime,
            EntryDetail::Contact(_) | EntryDetail::AppPackage(_) => None,
        }
    }
}

/// Per-type fields of a collated entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryDetail {
    Sms(SmsFields),
    Call(CallFields),
    Contact(ContactFields),
    AppPackage(AppPackageFields),
}

impl EntryDetail {
    pub fn log_type(&self) -> LogType {
        match self {
            EntryDetail::Sms(_) => LogType::Sms,
            EntryDetail::Call(_) => LogType::Call,
            EntryDetail::Contact(_) => LogType::Contact,
            EntryDetail::AppPackage(_) => LogType::AppPackage,
        }
    }
}

/// SMS fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SmsFields {
    /// Raw UTF-8 bytes of the message body; some message kinds have none.
    #[serde(serialize_with = "serialize_body")]
    pub message_body: Option<Vec<u8>>,
    /// MD5 hex of `message_body`, or empty when the body is absent.
    pub body_hash: String,
    pub sms_type: Option<String>,
    pub thread_id: Option<i64>,
    pub contact_id: Option<i64>,
    pub datetime: Option<NaiveDateTime>,
    pub sms_address: Option<String>,
    pub normalized_sms_address: Option<String>,
    pub item_id: i64,
}

/// Call log fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CallFields {
    pub cached_name: Option<String>,
    pub call_type: Option<String>,
    pub item_id: i64,
    pub phone_number: String,
    pub normalized_phone_number: String,
    pub datetime: Option<NaiveDateTime>,
    pub duration: Option<i64>,
}

/// Contact fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContactFields {
    pub display_name: Option<String>,
    pub item_id: i64,
    pub last_time_contacted: Option<NaiveDateTime>,
    pub photo_id: Option<String>,
    pub times_contacted: Option<i64>,
    /// Phone-number sub-records, kept as the JSON text they were hashed from.
    pub phone_numbers: Option<String>,
}

/// App package fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AppPackageFields {
    pub package_name: String,
}

fn serialize_body<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match body {
        Some(bytes) => s.serialize_str(&String::from_utf8_lossy(bytes)),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 6, 5)
            .unwrap()
            .and_hms_opt(22, 16, 45)
            .unwrap()
    }

    fn sms_entry() -> CollatedEntry {
        CollatedEntry {
            identity_id: "id".to_string(),
            content_hash: "hash".to_string(),
            device_id: "1".to_string(),
            user_id: 100,
            is_deleted: false,
            last_update_time: ts(),
            detail: EntryDetail::Sms(SmsFields {
                message_body: Some(b"Jambo".to_vec()),
                item_id: 123,
                datetime: Some(ts()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_accessors_follow_detail() {
        let entry = sms_entry();
        assert_eq!(entry.log_type(), LogType::Sms);
        assert_eq!(entry.item_id(), Some(123));
        assert_eq!(entry.datetime(), Some(ts()));

        let app = CollatedEntry {
            detail: EntryDetail::AppPackage(AppPackageFields {
                package_name: "app.one".to_string(),
            }),
            ..entry
        };
        assert_eq!(app.log_type(), LogType::AppPackage);
        assert_eq!(app.item_id(), None);
        assert_eq!(app.datetime(), None);
    }

    #[test]
    fn test_serialize_flattens_detail() {
        let value = serde_json::to_value(sms_entry()).unwrap();
        assert_eq!(value["identity_id"], "id");
        assert_eq!(value["item_id"], 123);
        assert_eq!(value["message_body"], "Jambo");
        assert!(value.get("detail").is_none());
    }
}
