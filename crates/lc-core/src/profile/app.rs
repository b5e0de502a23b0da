//! Installed application packages profile.

use lc_common::{AppPackageFields, CollatedEntry, EntryDetail, LogType, Result};
use lc_hash::{normalize_package_name, to_compat_string, HashInput};
use serde::Serialize;

use super::{read_string, EntryOrigin, LogProfile};
use crate::record_set::tombstoned_identities;
use crate::upload::RawEntry;

const KNOWN_FIELDS: &[&str] = &["package_name"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AppPackageProfile;

impl LogProfile for AppPackageProfile {
    fn log_type(&self) -> LogType {
        LogType::AppPackage
    }

    fn known_fields(&self) -> &'static [&'static str] {
        KNOWN_FIELDS
    }

    fn normalize(&self, raw: &RawEntry, origin: &EntryOrigin<'_>) -> Result<Option<CollatedEntry>> {
        let Some(package_name) = read_string(raw, "package_name")
            .as_deref()
            .and_then(normalize_package_name)
        else {
            return Ok(None);
        };

        let identity_id = HashInput::new()
            .stringified(&origin.user_id)
            .part(origin.device_id)
            .part(&package_name)
            .digest();
        let content_hash = HashInput::new()
            .part(&identity_id)
            .part(&false)
            .digest();

        Ok(Some(CollatedEntry {
            identity_id,
            content_hash,
            device_id: origin.device_id.to_string(),
            user_id: origin.user_id,
            is_deleted: false,
            last_update_time: origin.processing_time,
            detail: EntryDetail::AppPackage(AppPackageFields { package_name }),
        }))
    }

    fn content_hash(&self, entry: &CollatedEntry) -> String {
        super::base_content_hash(entry)
    }

    /// The device's live packages, in merge order.
    fn render_export(&self, entries: &[CollatedEntry], device_id: &str) -> Result<Option<Vec<u8>>> {
        let deleted = tombstoned_identities(entries);

        let rows: Vec<AppExportRow<'_>> = entries
            .iter()
            .filter(|e| e.device_id == device_id && !deleted.contains(e.identity_id.as_str()))
            .filter_map(|e| match &e.detail {
                EntryDetail::AppPackage(fields) => Some(AppExportRow {
                    package_name: &fields.package_name,
                }),
                _ => None,
            })
            .collect();

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(to_compat_string(&rows)?.into_bytes()))
    }
}

#[derive(Debug, Serialize)]
struct AppExportRow<'a> {
    package_name: &'a str,
}
