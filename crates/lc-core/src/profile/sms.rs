//! SMS profile.
//!
//! Devices only ever upload messages they have not uploaded before, so SMS
//! never infers deletions.

use std::collections::BTreeMap;

use lc_common::{CollatedEntry, EntryDetail, LogType, Result, SmsFields};
use lc_hash::{md5_hex, normalize_phone_number, to_compat_string, HashInput};
use serde::Serialize;

use super::{
    code_for, epoch_millis, read_field, read_i64, read_string, require_datetime,
    require_item_id, resolve_code, value_as_string, EntryOrigin, LogProfile,
};
use crate::upload::RawEntry;

/// Android `Telephony.TextBasedSmsColumns` message types.
pub const SMS_TYPES: [(i64, &str); 7] = [
    (0, "all"),
    (1, "inbox"),
    (2, "sent"),
    (3, "draft"),
    (4, "outbox"),
    (5, "failed"),
    (6, "queued"),
];

const KNOWN_FIELDS: &[&str] = &[
    "message_body",
    "thread_id",
    "sms_type",
    // Legacy alias of sms_type sent by some Android builds
    "type",
    "contact_id",
    "datetime",
    "sms_address",
    "normalized_sms_address",
    "item_id",
    "body_hash",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SmsProfile;

impl SmsProfile {
    fn content_hash_of(identity_id: &str, fields: &SmsFields, is_deleted: bool) -> String {
        HashInput::new()
            .part(identity_id)
            .part(&fields.sms_type)
            .part(&fields.thread_id)
            .part(&fields.contact_id)
            .part(&fields.normalized_sms_address)
            .part(&is_deleted)
            .digest()
    }
}

impl LogProfile for SmsProfile {
    fn log_type(&self) -> LogType {
        LogType::Sms
    }

    fn known_fields(&self) -> &'static [&'static str] {
        KNOWN_FIELDS
    }

    fn normalize(&self, raw: &RawEntry, origin: &EntryOrigin<'_>) -> Result<Option<CollatedEntry>> {
        let item_id = require_item_id(raw, LogType::Sms)?;
        let datetime = require_datetime(raw, LogType::Sms)?;

        // Some message kinds have no body; the body hash is then empty but
        // still part of the identity
        let message_body = read_field(raw, &["message_body"])
            .and_then(value_as_string)
            .map(String::into_bytes);
        let body_hash = message_body
            .as_deref()
            .map(md5_hex)
            .unwrap_or_default();

        let sms_address = read_string(raw, "sms_address");
        let fields = SmsFields {
            sms_type: resolve_code(read_field(raw, &["sms_type", "type"]), &SMS_TYPES),
            thread_id: read_i64(raw, "thread_id"),
            contact_id: read_i64(raw, "contact_id"),
            normalized_sms_address: sms_address.as_deref().map(normalize_phone_number),
            sms_address,
            message_body,
            body_hash,
            datetime,
            item_id,
        };

        let identity_id = HashInput::new()
            .stringified(&origin.user_id)
            .part(origin.device_id)
            .stringified(&fields.datetime)
            .stringified(&fields.item_id)
            .part(&fields.sms_address)
            .part(&fields.body_hash)
            .digest();
        let content_hash = Self::content_hash_of(&identity_id, &fields, false);

        Ok(Some(CollatedEntry {
            identity_id,
            content_hash,
            device_id: origin.device_id.to_string(),
            user_id: origin.user_id,
            is_deleted: false,
            last_update_time: origin.processing_time,
            detail: EntryDetail::Sms(fields),
        }))
    }

    fn content_hash(&self, entry: &CollatedEntry) -> String {
        match &entry.detail {
            EntryDetail::Sms(fields) => {
                Self::content_hash_of(&entry.identity_id, fields, entry.is_deleted)
            }
            _ => super::base_content_hash(entry),
        }
    }

    fn infers_deletions(&self) -> bool {
        false
    }

    /// Clamp message times that lie after the processing time, a symptom of
    /// device clock skew.
    fn repair(&self, entries: &mut [CollatedEntry]) -> usize {
        let mut repaired = 0;
        for entry in entries.iter_mut() {
            let ts_updated = entry.last_update_time;
            if let EntryDetail::Sms(fields) = &mut entry.detail {
                if matches!(fields.datetime, Some(dt) if dt > ts_updated) {
                    fields.datetime = Some(ts_updated);
                    repaired += 1;
                }
            }
        }
        repaired
    }

    /// Every device's messages, newest first.
    fn render_export(&self, entries: &[CollatedEntry], _device_id: &str) -> Result<Option<Vec<u8>>> {
        let mut rows: BTreeMap<String, SmsExportRow> = BTreeMap::new();
        for entry in entries {
            let EntryDetail::Sms(fields) = &entry.detail else {
                continue;
            };
            let datetime = fields.datetime.as_ref().map(epoch_millis).unwrap_or(0);
            let row = SmsExportRow {
                contact_id: fields.contact_id,
                datetime,
                item_id: fields.item_id,
                message_body: fields
                    .message_body
                    .as_ref()
                    .and_then(|b| String::from_utf8(b.clone()).ok()),
                sms_address: fields.sms_address.clone(),
                sms_type: code_for(fields.sms_type.as_deref(), &SMS_TYPES),
                thread_id: fields.thread_id,
            };
            rows.insert(format!("{}:{}", datetime, fields.item_id), row);
        }

        if rows.is_empty() {
            return Ok(None);
        }
        let ordered: Vec<SmsExportRow> = rows.into_values().rev().collect();
        Ok(Some(to_compat_string(&ordered)?.into_bytes()))
    }
}

#[derive(Debug, Serialize)]
struct SmsExportRow {
    contact_id: Option<i64>,
    datetime: i64,
    item_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_body: Option<String>,
    sms_address: Option<String>,
    sms_type: Option<i64>,
    thread_id: Option<i64>,
}
