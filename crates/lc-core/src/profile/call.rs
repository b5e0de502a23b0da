//! Call log profile.

use std::collections::BTreeMap;

use lc_common::{CallFields, CollatedEntry, EntryDetail, LogType, Result};
use lc_hash::{normalize_phone_number, to_compat_string, HashInput};
use serde::Serialize;

use super::{
    code_for, epoch_millis, read_field, read_string, read_truncated_i64, require_datetime,
    require_item_id, resolve_code, EntryOrigin, LogProfile,
};
use crate::upload::RawEntry;

/// Android `CallLog.Calls` types.
pub const CALL_TYPES: [(i64, &str); 7] = [
    (1, "incoming"),
    (2, "outgoing"),
    (3, "missed"),
    (4, "voicemail"),
    (5, "rejected"),
    (6, "blocked"),
    (7, "answered_externally"),
];

const KNOWN_FIELDS: &[&str] = &[
    "cached_name",
    "call_type",
    "item_id",
    "phone_number",
    "normalized_phone_number",
    "datetime",
    "duration",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CallProfile;

impl CallProfile {
    fn content_hash_of(identity_id: &str, fields: &CallFields, is_deleted: bool) -> String {
        HashInput::new()
            .part(identity_id)
            .part(&fields.cached_name)
            .part(&fields.call_type)
            .part(&fields.normalized_phone_number)
            .part(&fields.duration)
            .part(&is_deleted)
            .digest()
    }
}

impl LogProfile for CallProfile {
    fn log_type(&self) -> LogType {
        LogType::Call
    }

    fn known_fields(&self) -> &'static [&'static str] {
        KNOWN_FIELDS
    }

    fn normalize(&self, raw: &RawEntry, origin: &EntryOrigin<'_>) -> Result<Option<CollatedEntry>> {
        let phone_number = match read_string(raw, "phone_number") {
            Some(number) if !number.is_empty() => number,
            _ => return Ok(None),
        };
        let item_id = require_item_id(raw, LogType::Call)?;
        let datetime = require_datetime(raw, LogType::Call)?;

        let fields = CallFields {
            cached_name: read_string(raw, "cached_name"),
            call_type: resolve_code(read_field(raw, &["call_type"]), &CALL_TYPES),
            item_id,
            normalized_phone_number: normalize_phone_number(&phone_number),
            phone_number,
            datetime,
            duration: read_truncated_i64(raw, "duration"),
        };

        let identity_id = HashInput::new()
            .stringified(&origin.user_id)
            .part(origin.device_id)
            .stringified(&fields.datetime)
            .stringified(&fields.item_id)
            .part(&fields.phone_number)
            .digest();
        let content_hash = Self::content_hash_of(&identity_id, &fields, false);

        Ok(Some(CollatedEntry {
            identity_id,
            content_hash,
            device_id: origin.device_id.to_string(),
            user_id: origin.user_id,
            is_deleted: false,
            last_update_time: origin.processing_time,
            detail: EntryDetail::Call(fields),
        }))
    }

    fn content_hash(&self, entry: &CollatedEntry) -> String {
        match &entry.detail {
            EntryDetail::Call(fields) => {
                Self::content_hash_of(&entry.identity_id, fields, entry.is_deleted)
            }
            _ => super::base_content_hash(entry),
        }
    }

    /// Every device's calls, newest first. Tombstones are kept.
    fn render_export(&self, entries: &[CollatedEntry], _device_id: &str) -> Result<Option<Vec<u8>>> {
        let mut rows: BTreeMap<String, CallExportRow> = BTreeMap::new();
        for entry in entries {
            let EntryDetail::Call(fields) = &entry.detail else {
                continue;
            };
            let datetime = fields.datetime.as_ref().map(epoch_millis).unwrap_or(0);
            let row = CallExportRow {
                cached_name: fields.cached_name.clone(),
                call_type: code_for(fields.call_type.as_deref(), &CALL_TYPES),
                item_id: fields.item_id,
                phone_number: fields.phone_number.clone(),
                datetime,
                duration: fields.duration,
            };
            rows.insert(format!("{}:{}", datetime, fields.item_id), row);
        }

        if rows.is_empty() {
            return Ok(None);
        }
        let ordered: Vec<CallExportRow> = rows.into_values().rev().collect();
        Ok(Some(to_compat_string(&ordered)?.into_bytes()))
    }
}

#[derive(Debug, Serialize)]
struct CallExportRow {
    cached_name: Option<String>,
    call_type: Option<i64>,
    item_id: i64,
    phone_number: String,
    datetime: i64,
    duration: Option<i64>,
}
