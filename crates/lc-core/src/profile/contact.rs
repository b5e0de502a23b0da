//! Contact list profile.
//!
//! A contact's phone numbers are a list of sub-records. They are kept as the
//! JSON text they were hashed from, and only parsed again for export.

use std::collections::{BTreeMap, HashMap};

use lc_common::{CollatedEntry, ContactFields, EntryDetail, Error, LogType, Result};
use lc_hash::{to_compat_string, HashInput};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    parse_epoch, read_field, read_i64, read_string, read_truncated_i64, require_item_id,
    value_as_i64, EntryOrigin, LogProfile,
};
use crate::record_set::tombstoned_identities;
use crate::upload::RawEntry;

const KNOWN_FIELDS: &[&str] = &[
    "display_name",
    "item_id",
    "last_time_contacted",
    "photo_id",
    "times_contacted",
    "phone_numbers",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ContactProfile;

impl ContactProfile {
    fn content_hash_of(identity_id: &str, fields: &ContactFields, is_deleted: bool) -> String {
        HashInput::new()
            .part(identity_id)
            .part(&fields.display_name)
            .part(&fields.last_time_contacted)
            .part(&fields.times_contacted)
            .part(&fields.photo_id)
            .part(&fields.phone_numbers)
            .part(&is_deleted)
            .digest()
    }
}

impl LogProfile for ContactProfile {
    fn log_type(&self) -> LogType {
        LogType::Contact
    }

    fn known_fields(&self) -> &'static [&'static str] {
        KNOWN_FIELDS
    }

    fn normalize(&self, raw: &RawEntry, origin: &EntryOrigin<'_>) -> Result<Option<CollatedEntry>> {
        let item_id = require_item_id(raw, LogType::Contact)?;
        let phone_numbers = match read_field(raw, &["phone_numbers"]) {
            Some(value) => Some(to_compat_string(value)?),
            None => None,
        };

        let fields = ContactFields {
            display_name: read_string(raw, "display_name"),
            item_id,
            last_time_contacted: read_truncated_i64(raw, "last_time_contacted").and_then(parse_epoch),
            photo_id: read_string(raw, "photo_id"),
            times_contacted: read_i64(raw, "times_contacted"),
            phone_numbers,
        };

        let identity_id = HashInput::new()
            .stringified(&origin.user_id)
            .part(origin.device_id)
            .stringified(&fields.item_id)
            .digest();
        let content_hash = Self::content_hash_of(&identity_id, &fields, false);

        Ok(Some(CollatedEntry {
            identity_id,
            content_hash,
            device_id: origin.device_id.to_string(),
            user_id: origin.user_id,
            is_deleted: false,
            last_update_time: origin.processing_time,
            detail: EntryDetail::Contact(fields),
        }))
    }

    fn content_hash(&self, entry: &CollatedEntry) -> String {
        match &entry.detail {
            EntryDetail::Contact(fields) => {
                Self::content_hash_of(&entry.identity_id, fields, entry.is_deleted)
            }
            _ => super::base_content_hash(entry),
        }
    }

    /// The device's live contacts in ascending item id order.
    fn render_export(&self, entries: &[CollatedEntry], device_id: &str) -> Result<Option<Vec<u8>>> {
        let deleted = tombstoned_identities(entries);

        let mut rows: BTreeMap<i64, ContactExportRow> = BTreeMap::new();
        for entry in entries {
            if entry.device_id != device_id || deleted.contains(entry.identity_id.as_str()) {
                continue;
            }
            let EntryDetail::Contact(fields) = &entry.detail else {
                continue;
            };
            let phone_numbers = match fields.phone_numbers.as_deref() {
                Some(text) if !text.is_empty() => Value::Array(dedupe_phone_numbers(text)?),
                Some(text) => Value::String(text.to_string()),
                None => Value::Null,
            };
            rows.insert(
                fields.item_id,
                ContactExportRow {
                    display_name: fields.display_name.clone(),
                    item_id: fields.item_id,
                    phone_numbers,
                },
            );
        }

        if rows.is_empty() {
            return Ok(None);
        }
        let ordered: Vec<ContactExportRow> = rows.into_values().collect();
        Ok(Some(to_compat_string(&ordered)?.into_bytes()))
    }
}

#[derive(Debug, Serialize)]
struct ContactExportRow {
    display_name: Option<String>,
    item_id: i64,
    phone_numbers: Value,
}

/// Truthy string form of a dedupe key.
fn dedupe_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Collapse phone-number sub-records that share a number.
///
/// Sub-records are keyed by `normalized_phone_number`, falling back to
/// `phone_number`; ones with neither are dropped. Within a key the record
/// with the highest `item_id` wins, at the position where the key first
/// appeared.
pub fn dedupe_phone_numbers(text: &str) -> Result<Vec<Value>> {
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| Error::Export(format!("unparseable phone_numbers: {}", e)))?;
    let Value::Array(records) = parsed else {
        return Err(Error::Export(format!(
            "phone_numbers is not a list: {}",
            text
        )));
    };

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<Map<String, Value>> = Vec::new();
    for record in records {
        let Value::Object(record) = record else {
            return Err(Error::Export(format!(
                "phone_numbers entry is not an object: {}",
                text
            )));
        };
        let key = dedupe_key(record.get("normalized_phone_number"))
            .or_else(|| dedupe_key(record.get("phone_number")));
        let Some(key) = key else {
            continue;
        };

        let item_id = |r: &Map<String, Value>| r.get("item_id").and_then(value_as_i64).unwrap_or(0);
        match slots.get(&key) {
            Some(&slot) => {
                if item_id(&deduped[slot]) < item_id(&record) {
                    deduped[slot] = record;
                }
            }
            None => {
                slots.insert(key, deduped.len());
                deduped.push(record);
            }
        }
    }

    Ok(deduped.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::test_support::{origin, processing_time, raw};
    use serde_json::json;

    fn deno() -> RawEntry {
        raw(json!({
            "display_name": "Deno",
            "item_id": 201338,
            "last_time_contacted": 1510590105792_i64,
            "photo_id": 417143,
            "times_contacted": 1,
            "phone_numbers": [
                {"item_id": 417151, "normalized_phone_number": "+254729477015", "phone_number": "(072) 947-7015"},
                {"item_id": 417166, "normalized_phone_number": "+254729477015", "phone_number": "0729477015"}
            ]
        }))
    }

    fn fred() -> RawEntry {
        raw(json!({
            "display_name": "Fred",
            "item_id": 2,
            "last_time_contacted": 1528237005,
            "photo_id": "2",
            "times_contacted": 66,
            "phone_numbers": [
                {"item_id": 6, "normalized_phone_number": "+254723270125", "phone_number": "0723 270125"}
            ]
        }))
    }

    #[test]
    fn test_normalize_pinned_hashes() {
        let entry = ContactProfile
            .normalize(&deno(), &origin(123, "456"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.identity_id, "b3577e0d98aab314bacb05cfb225b92d");
        assert_eq!(entry.content_hash, "15aaef1191890c5388bdc4f44dd7526f");

        let EntryDetail::Contact(fields) = &entry.detail else {
            panic!("wrong detail");
        };
        assert_eq!(fields.photo_id.as_deref(), Some("417143"));
        assert_eq!(
            lc_hash::render_datetime(&fields.last_time_contacted.unwrap()),
            "2017-11-13 16:21:45.792000"
        );
        assert_eq!(
            fields.phone_numbers.as_deref(),
            Some(
                r#"[{"item_id": 417151, "normalized_phone_number": "+254729477015", "phone_number": "(072) 947-7015"}, {"item_id": 417166, "normalized_phone_number": "+254729477015", "phone_number": "0729477015"}]"#
            )
        );
    }

    #[test]
    fn test_seconds_epoch_contact() {
        let entry = ContactProfile
            .normalize(&fred(), &origin(100, "1"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.identity_id, "c086d7b593ac95217ff38ce045bf7992");
        assert_eq!(entry.content_hash, "29fbdd5b7026edabb693fd0c2491584b");
        assert_eq!(entry.last_update_time, processing_time());
    }

    #[test]
    fn test_fractional_last_time_contacted_is_truncated() {
        let mut entry = fred();
        entry.insert("last_time_contacted".into(), json!(1528237005.75));
        let fractional = ContactProfile
            .normalize(&entry, &origin(100, "1"))
            .unwrap()
            .unwrap();
        let whole = ContactProfile
            .normalize(&fred(), &origin(100, "1"))
            .unwrap()
            .unwrap();
        assert_eq!(fractional.content_hash, whole.content_hash);
        assert_eq!(fractional.content_hash, "29fbdd5b7026edabb693fd0c2491584b");
    }

    #[test]
    fn test_dedupe_prefers_highest_item_id() {
        let deduped = dedupe_phone_numbers(
            r#"[{"item_id": 9, "normalized_phone_number": "+1", "phone_number": "a"},
                {"item_id": 3, "phone_number": "0722"},
                {"item_id": 12, "normalized_phone_number": "+1", "phone_number": "b"},
                {"item_id": 4, "normalized_phone_number": "", "phone_number": ""},
                {"item_id": 1, "normalized_phone_number": "+1", "phone_number": "c"}]"#,
        )
        .unwrap();
        assert_eq!(
            deduped,
            vec![
                json!({"item_id": 12, "normalized_phone_number": "+1", "phone_number": "b"}),
                json!({"item_id": 3, "phone_number": "0722"}),
            ]
        );
    }

    #[test]
    fn test_dedupe_rejects_non_list() {
        assert!(matches!(
            dedupe_phone_numbers(r#""{num: \"+3445435\"}""#),
            Err(Error::Export(_))
        ));
        assert!(matches!(dedupe_phone_numbers("{num"), Err(Error::Export(_))));
    }

    #[test]
    fn test_export_is_device_scoped_and_skips_tombstoned() {
        let o = origin(123, "456");
        let deno = ContactProfile.normalize(&deno(), &o).unwrap().unwrap();
        let fred = ContactProfile.normalize(&fred(), &o).unwrap().unwrap();
        let other_device = ContactProfile
            .normalize(&fred_raw_with_id(7), &origin(123, "999"))
            .unwrap()
            .unwrap();
        let mut gone = fred.clone();
        gone.is_deleted = true;

        let body = ContactProfile
            .render_export(&[deno.clone(), fred.clone(), other_device.clone()], "456")
            .unwrap()
            .unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            concat!(
                r#"[{"display_name": "Fred", "item_id": 2, "phone_numbers": [{"item_id": 6, "normalized_phone_number": "+254723270125", "phone_number": "0723 270125"}]}, "#,
                r#"{"display_name": "Deno", "item_id": 201338, "phone_numbers": [{"item_id": 417166, "normalized_phone_number": "+254729477015", "phone_number": "0729477015"}]}]"#
            )
        );

        let body = ContactProfile
            .render_export(&[deno, fred, gone], "456")
            .unwrap()
            .unwrap();
        assert!(!String::from_utf8(body).unwrap().contains("Fred"));

        assert!(ContactProfile
            .render_export(&[other_device], "456")
            .unwrap()
            .is_none());
    }

    fn fred_raw_with_id(item_id: i64) -> RawEntry {
        let mut entry = fred();
        entry.insert("item_id".into(), json!(item_id));
        entry
    }
}
