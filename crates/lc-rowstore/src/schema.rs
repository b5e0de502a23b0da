//! Arrow schema definitions for collated artifacts.
//!
//! Every artifact shares the base columns:
//! - `id`: identity id
//! - `row_hash`: content hash
//! - `device_id`, `user_id`, `is_deleted`
//! - `ts_updated`: processing time of the version
//!
//! followed by the fields of its log type. Column names are those of the
//! artifacts already in the store and must not be renamed.

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use lc_common::LogType;
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_ROW_HASH: &str = "row_hash";
pub const COL_DEVICE_ID: &str = "device_id";
pub const COL_USER_ID: &str = "user_id";
pub const COL_IS_DELETED: &str = "is_deleted";
pub const COL_TS_UPDATED: &str = "ts_updated";

/// Timestamp representation on disk: naive nanoseconds.
pub const TIMESTAMP_TYPE: DataType = DataType::Timestamp(TimeUnit::Nanosecond, None);

/// Helper to create a timestamp field.
fn timestamp_field(name: &str, nullable: bool) -> Field {
    Field::new(name, TIMESTAMP_TYPE, nullable)
}

/// Helper to create a string field.
fn string_field(name: &str, nullable: bool) -> Field {
    Field::new(name, DataType::Utf8, nullable)
}

fn int_field(name: &str, nullable: bool) -> Field {
    Field::new(name, DataType::Int64, nullable)
}

/// Columns present in every artifact.
pub fn base_fields() -> Vec<Field> {
    vec![
        string_field(COL_ID, false),
        string_field(COL_ROW_HASH, false),
        string_field(COL_DEVICE_ID, false),
        int_field(COL_USER_ID, false),
        Field::new(COL_IS_DELETED, DataType::Boolean, false),
        timestamp_field(COL_TS_UPDATED, false),
    ]
}

/// Schema for `sms_log` artifacts.
pub fn sms_schema() -> Schema {
    let mut fields = base_fields();
    fields.extend([
        Field::new("message_body", DataType::Binary, true),
        string_field("body_hash", true),
        string_field("sms_type", true),
        int_field("thread_id", true),
        int_field("contact_id", true),
        timestamp_field("datetime", true),
        string_field("sms_address", true),
        string_field("normalized_sms_address", true),
        int_field("item_id", false),
    ]);
    Schema::new(fields)
}

/// Schema for `call_log` artifacts.
pub fn call_schema() -> Schema {
    let mut fields = base_fields();
    fields.extend([
        string_field("cached_name", true),
        string_field("call_type", true),
        int_field("item_id", false),
        string_field("phone_number", false),
        string_field("normalized_phone_number", false),
        timestamp_field("datetime", true),
        int_field("duration", true),
    ]);
    Schema::new(fields)
}

/// Schema for `contact_list` artifacts.
pub fn contact_schema() -> Schema {
    let mut fields = base_fields();
    fields.extend([
        string_field("display_name", true),
        int_field("item_id", false),
        timestamp_field("last_time_contacted", true),
        string_field("photo_id", true),
        int_field("times_contacted", true),
        // JSON text of the phone-number sub-records
        string_field("phone_numbers", true),
    ]);
    Schema::new(fields)
}

/// Schema for `app_packages` artifacts.
pub fn app_packages_schema() -> Schema {
    let mut fields = base_fields();
    fields.push(string_field("package_name", false));
    Schema::new(fields)
}

/// Schema by log type.
pub fn schema_for(log_type: LogType) -> Arc<Schema> {
    Arc::new(match log_type {
        LogType::Sms => sms_schema(),
        LogType::Call => call_schema(),
        LogType::Contact => contact_schema(),
        LogType::AppPackage => app_packages_schema(),
    })
}
