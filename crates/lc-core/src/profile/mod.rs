//! Log type profiles.
//!
//! A profile knows one log type's raw field schema, how to normalize a raw
//! upload entry into a [`CollatedEntry`], the identity and content hash
//! recipes, and the device-scoped export rendering. The set of log types is
//! closed; [`profile_for`] maps each one to its profile.

pub mod app;
pub mod call;
pub mod contact;
pub mod sms;

pub use app::AppPackageProfile;
pub use call::CallProfile;
pub use contact::ContactProfile;
pub use sms::SmsProfile;

use chrono::{DateTime, NaiveDateTime};
use lc_common::{CollatedEntry, Error, LogType, Result};
use lc_hash::{render_bool, HashInput};
use serde_json::Value;

use crate::upload::RawEntry;

/// Who uploaded an entry, and when it is being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOrigin<'a> {
    pub user_id: i64,
    pub device_id: &'a str,
    pub processing_time: NaiveDateTime,
}

/// Per-log-type behaviour used by the reconciliation engine.
pub trait LogProfile: Send + Sync {
    fn log_type(&self) -> LogType;

    /// Raw field names this log type understands.
    fn known_fields(&self) -> &'static [&'static str];

    /// Normalize one raw entry.
    ///
    /// `Ok(None)` means the entry is rejected and silently dropped. An entry
    /// without its natural key is an error.
    fn normalize(&self, raw: &RawEntry, origin: &EntryOrigin<'_>) -> Result<Option<CollatedEntry>>;

    /// Content hash of `entry` from its identity, mutable fields and
    /// deletion flag.
    fn content_hash(&self, entry: &CollatedEntry) -> String;

    /// Whether absence from an upload means deletion.
    fn infers_deletions(&self) -> bool {
        true
    }

    /// Post-merge repair over the whole merged set. Returns how many entries
    /// were changed.
    fn repair(&self, _entries: &mut [CollatedEntry]) -> usize {
        0
    }

    /// Export rendering of the merged set for `device_id`, or `None` when
    /// there is nothing to export.
    fn render_export(&self, entries: &[CollatedEntry], device_id: &str) -> Result<Option<Vec<u8>>>;

    /// Raw field names outside [`LogProfile::known_fields`], in upload order.
    fn unexpected_fields<'r>(&self, raw: &'r RawEntry) -> Vec<&'r str> {
        let known = self.known_fields();
        raw.keys()
            .map(String::as_str)
            .filter(|k| !known.contains(k))
            .collect()
    }
}

static SMS: SmsProfile = SmsProfile;
static CALL: CallProfile = CallProfile;
static CONTACT: ContactProfile = ContactProfile;
static APP_PACKAGE: AppPackageProfile = AppPackageProfile;

/// The profile for `log_type`.
pub fn profile_for(log_type: LogType) -> &'static dyn LogProfile {
    match log_type {
        LogType::Sms => &SMS,
        LogType::Call => &CALL,
        LogType::Contact => &CONTACT,
        LogType::AppPackage => &APP_PACKAGE,
    }
}

// ----------------------------------------------------------------------------
// Raw field readers shared by the profiles
// ----------------------------------------------------------------------------

/// Value of the first of `names` present in `raw`, with JSON null as absent.
pub(crate) fn read_field<'r>(raw: &'r RawEntry, names: &[&str]) -> Option<&'r Value> {
    names
        .iter()
        .find_map(|name| raw.get(*name))
        .filter(|v| !v.is_null())
}

/// Integer value of an integer or numeric-string JSON value.
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Integer coercion for numeric fields: fractional numbers are truncated
/// toward zero.
pub(crate) fn value_as_truncated_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        other => value_as_i64(other),
    }
}

/// String value; scalars are rendered, arrays and objects are not strings.
pub(crate) fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(render_bool(*b).to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn read_i64(raw: &RawEntry, name: &str) -> Option<i64> {
    read_field(raw, &[name]).and_then(value_as_i64)
}

pub(crate) fn read_truncated_i64(raw: &RawEntry, name: &str) -> Option<i64> {
    read_field(raw, &[name]).and_then(value_as_truncated_i64)
}

pub(crate) fn read_string(raw: &RawEntry, name: &str) -> Option<String> {
    read_field(raw, &[name]).and_then(value_as_string)
}

/// The natural item id; every SMS, call and contact entry carries one.
pub(crate) fn require_item_id(raw: &RawEntry, log_type: LogType) -> Result<i64> {
    read_i64(raw, "item_id").ok_or(Error::MissingField {
        log_type: log_type.as_str(),
        field: "item_id",
    })
}

/// The event time of an SMS or call entry.
///
/// The field must be present; a fractional epoch is truncated, and a value
/// that is not a convertible epoch yields `None`.
pub(crate) fn require_datetime(raw: &RawEntry, log_type: LogType) -> Result<Option<NaiveDateTime>> {
    let value = read_field(raw, &["datetime"]).ok_or(Error::MissingField {
        log_type: log_type.as_str(),
        field: "datetime",
    })?;
    Ok(value_as_truncated_i64(value).and_then(parse_epoch))
}

/// Epoch seconds or milliseconds to a naive UTC timestamp.
///
/// More than ten digits (sign included) means milliseconds.
pub fn parse_epoch(raw: i64) -> Option<NaiveDateTime> {
    let parsed = if raw.to_string().len() > 10 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    };
    parsed.map(|dt| dt.naive_utc())
}

/// Map a numeric type code through `table`.
///
/// Absent codes stay absent; codes outside the table, including
/// non-numeric ones, become `"unknown"`.
pub(crate) fn resolve_code(value: Option<&Value>, table: &[(i64, &str)]) -> Option<String> {
    let value = value?;
    let name = value_as_truncated_i64(value)
        .and_then(|code| table.iter().find(|(c, _)| *c == code))
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_CODE);
    Some(name.to_string())
}

/// Reverse of [`resolve_code`]; unmapped names have no code.
pub(crate) fn code_for(name: Option<&str>, table: &[(i64, &str)]) -> Option<i64> {
    let name = name?;
    table.iter().find(|(_, n)| *n == name).map(|(c, _)| *c)
}

/// Name given to a type code outside the known enumeration.
pub const UNKNOWN_CODE: &str = "unknown";

/// Hash of identity and deletion flag only, for an entry whose detail does
/// not belong to the profile asked to hash it.
pub(crate) fn base_content_hash(entry: &CollatedEntry) -> String {
    HashInput::new()
        .part(&entry.identity_id)
        .part(&entry.is_deleted)
        .digest()
}

/// Epoch milliseconds of a naive UTC timestamp.
pub(crate) fn epoch_millis(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;

    pub fn raw(value: serde_json::Value) -> RawEntry {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    pub fn processing_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 6, 5)
            .unwrap()
            .and_hms_opt(22, 16, 45)
            .unwrap()
    }

    pub fn origin(user_id: i64, device_id: &str) -> EntryOrigin<'_> {
        EntryOrigin {
            user_id,
            device_id,
            processing_time: processing_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::raw;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_table_is_consistent() {
        for log_type in LogType::ALL {
            assert_eq!(profile_for(log_type).log_type(), log_type);
        }
        assert!(!profile_for(LogType::Sms).infers_deletions());
        assert!(profile_for(LogType::Call).infers_deletions());
        assert!(profile_for(LogType::Contact).infers_deletions());
        assert!(profile_for(LogType::AppPackage).infers_deletions());
    }

    #[test]
    fn test_parse_epoch_seconds_and_millis() {
        let secs = parse_epoch(1_487_722_326).unwrap();
        assert_eq!(secs.to_string(), "2017-02-22 00:12:06");
        let millis = parse_epoch(1_487_722_326_477).unwrap();
        assert_eq!(millis.to_string(), "2017-02-22 00:12:06.477");
        assert!(parse_epoch(i64::MAX).is_none());
    }

    #[test]
    fn test_read_field_aliases_and_nulls() {
        let entry = raw(json!({"type": 2, "thread_id": null}));
        assert_eq!(read_field(&entry, &["sms_type", "type"]), Some(&json!(2)));
        assert_eq!(read_field(&entry, &["thread_id"]), None);

        // The first present name wins even when its value is null
        let entry = raw(json!({"sms_type": null, "type": 2}));
        assert_eq!(read_field(&entry, &["sms_type", "type"]), None);
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(value_as_i64(&json!(5)), Some(5));
        assert_eq!(value_as_i64(&json!("5")), Some(5));
        assert_eq!(value_as_i64(&json!(5.0)), Some(5));
        assert_eq!(value_as_i64(&json!(5.5)), None);
        assert_eq!(value_as_i64(&json!("five")), None);
        assert_eq!(value_as_string(&json!(417143)), Some("417143".to_string()));
        assert_eq!(value_as_string(&json!([1])), None);
        assert_eq!(value_as_string(&json!(true)), Some("True".to_string()));
        assert_eq!(value_as_string(&json!(false)), Some("False".to_string()));
    }

    #[test]
    fn test_truncating_coercion() {
        assert_eq!(value_as_truncated_i64(&json!(61.5)), Some(61));
        assert_eq!(value_as_truncated_i64(&json!(-2.7)), Some(-2));
        assert_eq!(value_as_truncated_i64(&json!(1487722326.9)), Some(1487722326));
        assert_eq!(value_as_truncated_i64(&json!(7)), Some(7));
        assert_eq!(value_as_truncated_i64(&json!("7")), Some(7));
        assert_eq!(value_as_truncated_i64(&json!(1e300)), None);
        assert_eq!(value_as_truncated_i64(&json!(true)), None);
    }

    #[test]
    fn test_resolve_code() {
        let table = [(1, "one"), (2, "two")];
        assert_eq!(resolve_code(Some(&json!("2")), &table), Some("two".into()));
        assert_eq!(resolve_code(Some(&json!(9)), &table), Some("unknown".into()));
        assert_eq!(resolve_code(Some(&json!("x")), &table), Some("unknown".into()));
        assert_eq!(resolve_code(Some(&json!(2.9)), &table), Some("two".into()));
        assert_eq!(resolve_code(None, &table), None);
        assert_eq!(code_for(Some("one"), &table), Some(1));
        assert_eq!(code_for(Some("unknown"), &table), None);
        assert_eq!(code_for(None, &table), None);
    }

    #[test]
    fn test_missing_required_fields() {
        let entry = raw(json!({"datetime": 1}));
        assert!(matches!(
            require_item_id(&entry, LogType::Call),
            Err(Error::MissingField { field: "item_id", .. })
        ));
        let entry = raw(json!({"item_id": 1}));
        assert!(matches!(
            require_datetime(&entry, LogType::Sms),
            Err(Error::MissingField { field: "datetime", .. })
        ));
        let entry = raw(json!({"datetime": "soon"}));
        assert_eq!(require_datetime(&entry, LogType::Sms).unwrap(), None);
    }
}
