//! Log collator row-store codec.
//!
//! This crate provides:
//! - Arrow schema definitions for the current and diff artifacts
//! - In-memory Parquet encoding of collated entries
//! - Lenient decoding of artifacts written by older producers

pub mod error;
pub mod reader;
pub mod schema;
pub mod writer;

pub use error::CodecError;
pub use reader::{decode_entries, pretty_table, read_batches};
pub use schema::{schema_for, TIMESTAMP_TYPE};
pub use writer::{encode_entries, to_record_batch, CodecConfig, CompressionKind};
