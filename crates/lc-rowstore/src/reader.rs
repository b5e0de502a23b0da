//! Parquet decoder for collated artifacts.
//!
//! Artifacts were written by more than one producer over the years, so the
//! decoder is lenient about physical types: integers of any width, large
//! strings, and timestamps of any unit are cast to the canonical type before
//! reading. Optional type columns that are absent read as null. Base columns
//! and required type columns must be present.

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Int64Array, RecordBatch, StringArray,
    TimestampNanosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type, TimestampNanosecondType};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime};
use lc_common::{
    AppPackageFields, CallFields, CollatedEntry, ContactFields, EntryDetail, LogType, SmsFields,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::CodecError;
use crate::schema::{
    COL_DEVICE_ID, COL_ID, COL_IS_DELETED, COL_ROW_HASH, COL_TS_UPDATED, COL_USER_ID,
    TIMESTAMP_TYPE,
};

/// Read every record batch of an encoded artifact.
pub fn read_batches(bytes: &[u8]) -> Result<Vec<RecordBatch>, CodecError> {
    let reader =
        ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?.build()?;
    reader
        .map(|batch| batch.map_err(CodecError::from))
        .collect()
}

/// Render an encoded artifact as an ASCII table, columns as stored.
pub fn pretty_table(bytes: &[u8]) -> Result<String, CodecError> {
    let batches = read_batches(bytes)?;
    Ok(arrow::util::pretty::pretty_format_batches(&batches)?.to_string())
}

/// Decode an artifact into collated entries of `log_type`.
pub fn decode_entries(log_type: LogType, bytes: &[u8]) -> Result<Vec<CollatedEntry>, CodecError> {
    let mut entries = Vec::new();
    for batch in read_batches(bytes)? {
        decode_batch(log_type, &batch, &mut entries)?;
    }
    tracing::debug!(log_type = %log_type, rows = entries.len(), "decoded artifact");
    Ok(entries)
}

/// Typed, cast column access over one batch.
struct Columns<'a> {
    batch: &'a RecordBatch,
}

impl<'a> Columns<'a> {
    fn cast_column(&self, name: &str, to: &DataType) -> Result<Option<ArrayRef>, CodecError> {
        match self.batch.column_by_name(name) {
            Some(col) if col.data_type() == to => Ok(Some(col.clone())),
            Some(col) => Ok(Some(cast(col, to)?)),
            None => Ok(None),
        }
    }

    fn strings(&self, name: &str) -> Result<Option<StringArray>, CodecError> {
        Ok(self
            .cast_column(name, &DataType::Utf8)?
            .map(|a| a.as_string::<i32>().clone()))
    }

    fn ints(&self, name: &str) -> Result<Option<Int64Array>, CodecError> {
        Ok(self
            .cast_column(name, &DataType::Int64)?
            .map(|a| a.as_primitive::<Int64Type>().clone()))
    }

    fn bools(&self, name: &str) -> Result<Option<BooleanArray>, CodecError> {
        Ok(self
            .cast_column(name, &DataType::Boolean)?
            .map(|a| a.as_boolean().clone()))
    }

    fn binaries(&self, name: &str) -> Result<Option<BinaryArray>, CodecError> {
        Ok(self
            .cast_column(name, &DataType::Binary)?
            .map(|a| a.as_binary::<i32>().clone()))
    }

    fn timestamps(&self, name: &str) -> Result<Option<TimestampNanosecondArray>, CodecError> {
        Ok(self
            .cast_column(name, &TIMESTAMP_TYPE)?
            .map(|a| a.as_primitive::<TimestampNanosecondType>().clone()))
    }

    fn required<T>(
        name: &str,
        column: Result<Option<T>, CodecError>,
    ) -> Result<T, CodecError> {
        column?.ok_or_else(|| CodecError::MissingColumn(name.to_string()))
    }
}

fn opt<A: Array>(array: &Option<A>, row: usize) -> bool {
    matches!(array, Some(a) if !a.is_null(row))
}

fn opt_str(array: &Option<StringArray>, row: usize) -> Option<String> {
    if opt(array, row) {
        array.as_ref().map(|a| a.value(row).to_string())
    } else {
        None
    }
}

fn opt_int(array: &Option<Int64Array>, row: usize) -> Option<i64> {
    if opt(array, row) {
        array.as_ref().map(|a| a.value(row))
    } else {
        None
    }
}

fn opt_ts(array: &Option<TimestampNanosecondArray>, row: usize) -> Option<NaiveDateTime> {
    if opt(array, row) {
        array
            .as_ref()
            .map(|a| DateTime::from_timestamp_nanos(a.value(row)).naive_utc())
    } else {
        None
    }
}

fn req_str(array: &StringArray, name: &str, row: usize) -> Result<String, CodecError> {
    if array.is_null(row) {
        return Err(null_value(name, row));
    }
    Ok(array.value(row).to_string())
}

fn req_int(array: &Int64Array, name: &str, row: usize) -> Result<i64, CodecError> {
    if array.is_null(row) {
        return Err(null_value(name, row));
    }
    Ok(array.value(row))
}

fn null_value(name: &str, row: usize) -> CodecError {
    CodecError::NullValue {
        column: name.to_string(),
        row,
    }
}

fn decode_batch(
    log_type: LogType,
    batch: &RecordBatch,
    out: &mut Vec<CollatedEntry>,
) -> Result<(), CodecError> {
    let cols = Columns { batch };

    let ids = Columns::required(COL_ID, cols.strings(COL_ID))?;
    let hashes = Columns::required(COL_ROW_HASH, cols.strings(COL_ROW_HASH))?;
    let devices = Columns::required(COL_DEVICE_ID, cols.strings(COL_DEVICE_ID))?;
    let users = Columns::required(COL_USER_ID, cols.ints(COL_USER_ID))?;
    let deleted = Columns::required(COL_IS_DELETED, cols.bools(COL_IS_DELETED))?;
    let updated = Columns::required(COL_TS_UPDATED, cols.timestamps(COL_TS_UPDATED))?;

    let detail = DetailDecoder::new(log_type, &cols)?;

    out.reserve(batch.num_rows());
    for row in 0..batch.num_rows() {
        if updated.is_null(row) {
            return Err(null_value(COL_TS_UPDATED, row));
        }
        out.push(CollatedEntry {
            identity_id: req_str(&ids, COL_ID, row)?,
            content_hash: req_str(&hashes, COL_ROW_HASH, row)?,
            device_id: req_str(&devices, COL_DEVICE_ID, row)?,
            user_id: req_int(&users, COL_USER_ID, row)?,
            // A null flag never marked a tombstone
            is_deleted: !deleted.is_null(row) && deleted.value(row),
            last_update_time: DateTime::from_timestamp_nanos(updated.value(row)).naive_utc(),
            detail: detail.row(row)?,
        });
    }
    Ok(())
}

/// Per-type column set.
enum DetailDecoder {
    Sms {
        message_body: Option<BinaryArray>,
        body_hash: Option<StringArray>,
        sms_type: Option<StringArray>,
        thread_id: Option<Int64Array>,
        contact_id: Option<Int64Array>,
        datetime: Option<TimestampNanosecondArray>,
        sms_address: Option<StringArray>,
        normalized_sms_address: Option<StringArray>,
        item_id: Int64Array,
    },
    Call {
        cached_name: Option<StringArray>,
        call_type: Option<StringArray>,
        item_id: Int64Array,
        phone_number: StringArray,
        normalized_phone_number: StringArray,
        datetime: Option<TimestampNanosecondArray>,
        duration: Option<Int64Array>,
    },
    Contact {
        display_name: Option<StringArray>,
        item_id: Int64Array,
        last_time_contacted: Option<TimestampNanosecondArray>,
        photo_id: Option<StringArray>,
        times_contacted: Option<Int64Array>,
        phone_numbers: Option<StringArray>,
    },
    AppPackage {
        package_name: StringArray,
    },
}

impl DetailDecoder {
    fn new(log_type: LogType, cols: &Columns<'_>) -> Result<Self, CodecError> {
        Ok(match log_type {
            LogType::Sms => DetailDecoder::Sms {
                message_body: cols.binaries("message_body")?,
                body_hash: cols.strings("body_hash")?,
                sms_type: cols.strings("sms_type")?,
                thread_id: cols.ints("thread_id")?,
                contact_id: cols.ints("contact_id")?,
                datetime: cols.timestamps("datetime")?,
                sms_address: cols.strings("sms_address")?,
                normalized_sms_address: cols.strings("normalized_sms_address")?,
                item_id: Columns::required("item_id", cols.ints("item_id"))?,
            },
            LogType::Call => DetailDecoder::Call {
                cached_name: cols.strings("cached_name")?,
                call_type: cols.strings("call_type")?,
                item_id: Columns::required("item_id", cols.ints("item_id"))?,
                phone_number: Columns::required("phone_number", cols.strings("phone_number"))?,
                normalized_phone_number: Columns::required(
                    "normalized_phone_number",
                    cols.strings("normalized_phone_number"),
                )?,
                datetime: cols.timestamps("datetime")?,
                duration: cols.ints("duration")?,
            },
            LogType::Contact => DetailDecoder::Contact {
                display_name: cols.strings("display_name")?,
                item_id: Columns::required("item_id", cols.ints("item_id"))?,
                last_time_contacted: cols.timestamps("last_time_contacted")?,
                photo_id: cols.strings("photo_id")?,
                times_contacted: cols.ints("times_contacted")?,
                phone_numbers: cols.strings("phone_numbers")?,
            },
            LogType::AppPackage => DetailDecoder::AppPackage {
                package_name: Columns::required("package_name", cols.strings("package_name"))?,
            },
        })
    }

    fn row(&self, row: usize) -> Result<EntryDetail, CodecError> {
        Ok(match self {
            DetailDecoder::Sms {
                message_body,
                body_hash,
                sms_type,
                thread_id,
                contact_id,
                datetime,
                sms_address,
                normalized_sms_address,
                item_id,
            } => EntryDetail::Sms(SmsFields {
                message_body: if opt(message_body, row) {
                    message_body.as_ref().map(|a| a.value(row).to_vec())
                } else {
                    None
                },
                body_hash: opt_str(body_hash, row).unwrap_or_default(),
                sms_type: opt_str(sms_type, row),
                thread_id: opt_int(thread_id, row),
                contact_id: opt_int(contact_id, row),
                datetime: opt_ts(datetime, row),
                sms_address: opt_str(sms_address, row),
                normalized_sms_address: opt_str(normalized_sms_address, row),
                item_id: req_int(item_id, "item_id", row)?,
            }),
            DetailDecoder::Call {
                cached_name,
                call_type,
                item_id,
                phone_number,
                normalized_phone_number,
                datetime,
                duration,
            } => EntryDetail::Call(CallFields {
                cached_name: opt_str(cached_name, row),
                call_type: opt_str(call_type, row),
                item_id: req_int(item_id, "item_id", row)?,
                phone_number: req_str(phone_number, "phone_number", row)?,
                normalized_phone_number: req_str(
                    normalized_phone_number,
                    "normalized_phone_number",
                    row,
                )?,
                datetime: opt_ts(datetime, row),
                duration: opt_int(duration, row),
            }),
            DetailDecoder::Contact {
                display_name,
                item_id,
                last_time_contacted,
                photo_id,
                times_contacted,
                phone_numbers,
            } => EntryDetail::Contact(ContactFields {
                display_name: opt_str(display_name, row),
                item_id: req_int(item_id, "item_id", row)?,
                last_time_contacted: opt_ts(last_time_contacted, row),
                photo_id: opt_str(photo_id, row),
                times_contacted: opt_int(times_contacted, row),
                phone_numbers: opt_str(phone_numbers, row),
            }),
            DetailDecoder::AppPackage { package_name } => {
                EntryDetail::AppPackage(AppPackageFields {
                    package_name: req_str(package_name, "package_name", row)?,
                })
            }
        })
    }
}
