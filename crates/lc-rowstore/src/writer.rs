//! In-memory Parquet encoder for collated entries.
//!
//! The whole artifact is encoded to a byte buffer; persisting it is the object
//! store's job.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Int64Array, RecordBatch, StringArray,
    TimestampNanosecondArray,
};
use chrono::NaiveDateTime;
use lc_common::{
    AppPackageFields, CallFields, CollatedEntry, ContactFields, EntryDetail, LogType, SmsFields,
};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{WriterProperties, WriterVersion};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::schema::schema_for;

/// Default maximum rows per row group.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 64 * 1024;

/// Compression codec for encoded artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    Zstd,
    #[default]
    Snappy,
    None,
}

impl CompressionKind {
    fn to_parquet(self) -> Compression {
        match self {
            CompressionKind::Zstd => match ZstdLevel::try_new(3) {
                Ok(level) => Compression::ZSTD(level),
                Err(_) => Compression::ZSTD(ZstdLevel::default()),
            },
            CompressionKind::Snappy => Compression::SNAPPY,
            CompressionKind::None => Compression::UNCOMPRESSED,
        }
    }
}

/// Configuration for the encoder.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Compression codec.
    pub compression: CompressionKind,

    /// Maximum rows per row group.
    pub row_group_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            compression: CompressionKind::default(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

impl CodecConfig {
    /// Use zstd compression instead of snappy.
    pub fn with_zstd(mut self) -> Self {
        self.compression = CompressionKind::Zstd;
        self
    }

    pub fn with_compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }

    /// Set custom row group size.
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_1_0)
            .set_compression(self.compression.to_parquet())
            .set_max_row_group_size(self.row_group_size)
            .set_dictionary_enabled(true)
            .build()
    }
}

/// Encode entries of one log type into a Parquet byte buffer.
pub fn encode_entries(
    log_type: LogType,
    entries: &[CollatedEntry],
    config: &CodecConfig,
) -> Result<Vec<u8>, CodecError> {
    let batch = to_record_batch(log_type, entries)?;
    let mut writer = ArrowWriter::try_new(
        Vec::new(),
        batch.schema(),
        Some(config.writer_properties()),
    )?;
    writer.write(&batch)?;
    let bytes = writer.into_inner()?;
    tracing::debug!(
        log_type = %log_type,
        rows = entries.len(),
        bytes = bytes.len(),
        "encoded artifact"
    );
    Ok(bytes)
}

/// Build a record batch for entries of one log type.
pub fn to_record_batch(
    log_type: LogType,
    entries: &[CollatedEntry],
) -> Result<RecordBatch, CodecError> {
    if let Some(other) = entries.iter().find(|e| e.log_type() != log_type) {
        return Err(CodecError::MixedLogTypes {
            expected: log_type.as_str(),
            found: other.log_type().as_str(),
        });
    }

    let mut columns = base_columns(entries)?;
    match log_type {
        LogType::Sms => columns.extend(sms_columns(&details(entries, sms_of))?),
        LogType::Call => columns.extend(call_columns(&details(entries, call_of))?),
        LogType::Contact => columns.extend(contact_columns(&details(entries, contact_of))?),
        LogType::AppPackage => columns.extend(app_columns(&details(entries, app_of))),
    }

    Ok(RecordBatch::try_new(schema_for(log_type), columns)?)
}

fn details<'a, T>(
    entries: &'a [CollatedEntry],
    pick: fn(&'a EntryDetail) -> Option<&'a T>,
) -> Vec<&'a T> {
    entries.iter().filter_map(|e| pick(&e.detail)).collect()
}

fn sms_of(detail: &EntryDetail) -> Option<&SmsFields> {
    match detail {
        EntryDetail::Sms(f) => Some(f),
        _ => None,
    }
}

fn call_of(detail: &EntryDetail) -> Option<&CallFields> {
    match detail {
        EntryDetail::Call(f) => Some(f),
        _ => None,
    }
}

fn contact_of(detail: &EntryDetail) -> Option<&ContactFields> {
    match detail {
        EntryDetail::Contact(f) => Some(f),
        _ => None,
    }
}

fn app_of(detail: &EntryDetail) -> Option<&AppPackageFields> {
    match detail {
        EntryDetail::AppPackage(f) => Some(f),
        _ => None,
    }
}

fn nanos(column: &str, dt: &NaiveDateTime) -> Result<i64, CodecError> {
    dt.and_utc()
        .timestamp_nanos_opt()
        .ok_or_else(|| CodecError::TimestampOutOfRange {
            column: column.to_string(),
            value: dt.to_string(),
        })
}

fn optional_nanos(
    column: &str,
    values: impl Iterator<Item = Option<NaiveDateTime>>,
) -> Result<TimestampNanosecondArray, CodecError> {
    let values = values
        .map(|v| v.as_ref().map(|dt| nanos(column, dt)).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TimestampNanosecondArray::from(values))
}

fn base_columns(entries: &[CollatedEntry]) -> Result<Vec<ArrayRef>, CodecError> {
    let ts_updated = entries
        .iter()
        .map(|e| nanos("ts_updated", &e.last_update_time))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(vec![
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| e.identity_id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| e.content_hash.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            entries.iter().map(|e| e.device_id.as_str()),
        )),
        Arc::new(Int64Array::from_iter_values(entries.iter().map(|e| e.user_id))),
        Arc::new(BooleanArray::from(
            entries.iter().map(|e| e.is_deleted).collect::<Vec<_>>(),
        )),
        Arc::new(TimestampNanosecondArray::from(ts_updated)),
    ])
}

fn sms_columns(rows: &[&SmsFields]) -> Result<Vec<ArrayRef>, CodecError> {
    Ok(vec![
        Arc::new(BinaryArray::from_iter(
            rows.iter().map(|r| r.message_body.as_deref()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.body_hash.as_str()),
        )),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.sms_type.as_deref()))),
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.thread_id))),
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.contact_id))),
        Arc::new(optional_nanos("datetime", rows.iter().map(|r| r.datetime))?),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.sms_address.as_deref()),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.normalized_sms_address.as_deref()),
        )),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.item_id))),
    ])
}

fn call_columns(rows: &[&CallFields]) -> Result<Vec<ArrayRef>, CodecError> {
    Ok(vec![
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.cached_name.as_deref()),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.call_type.as_deref()),
        )),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.item_id))),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.phone_number.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.normalized_phone_number.as_str()),
        )),
        Arc::new(optional_nanos("datetime", rows.iter().map(|r| r.datetime))?),
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.duration))),
    ])
}

fn contact_columns(rows: &[&ContactFields]) -> Result<Vec<ArrayRef>, CodecError> {
    Ok(vec![
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.display_name.as_deref()),
        )),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.item_id))),
        Arc::new(optional_nanos(
            "last_time_contacted",
            rows.iter().map(|r| r.last_time_contacted),
        )?),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.photo_id.as_deref()),
        )),
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.times_contacted))),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.phone_numbers.as_deref()),
        )),
    ])
}

fn app_columns(rows: &[&AppPackageFields]) -> Vec<ArrayRef> {
    vec![Arc::new(StringArray::from_iter_values(
        rows.iter().map(|r| r.package_name.as_str()),
    ))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn app(name: &str) -> CollatedEntry {
        CollatedEntry {
            identity_id: format!("id-{name}"),
            content_hash: format!("hash-{name}"),
            device_id: "1".to_string(),
            user_id: 100,
            is_deleted: false,
            last_update_time: NaiveDate::from_ymd_opt(2018, 6, 5)
                .unwrap()
                .and_hms_opt(22, 16, 45)
                .unwrap(),
            detail: EntryDetail::AppPackage(AppPackageFields {
                package_name: name.to_string(),
            }),
        }
    }

    #[test]
    fn test_codec_config_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.compression, CompressionKind::Snappy);
        assert_eq!(config.row_group_size, DEFAULT_ROW_GROUP_SIZE);
        assert!(matches!(
            config.with_zstd().compression.to_parquet(),
            Compression::ZSTD(_)
        ));
    }

    #[test]
    fn test_record_batch_shape() {
        let batch = to_record_batch(LogType::AppPackage, &[app("a"), app("b")]).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 7);
    }

    #[test]
    fn test_mixed_log_types_rejected() {
        let err = to_record_batch(LogType::Call, &[app("a")]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MixedLogTypes {
                expected: "call_log",
                found: "app_packages"
            }
        ));
    }

    #[test]
    fn test_encode_produces_parquet_magic() {
        let bytes = encode_entries(LogType::AppPackage, &[app("a")], &CodecConfig::default())
            .unwrap();
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }
}
