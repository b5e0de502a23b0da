//! JSON text in the layout existing artifacts were written with.
//!
//! Contact phone-number lists are hashed as JSON text, and export files are
//! consumed by a system that has always received this exact layout:
//! `", "` between items, `": "` between key and value, every non-ASCII
//! character escaped as `\uXXXX` (UTF-16 code units, lowercase hex), and
//! object keys in insertion order.

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

/// `serde_json` formatter producing the compatible layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatFormatter;

impl Formatter for CompatFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !fragment.chars().any(needs_unicode_escape) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if !needs_unicode_escape(c) {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Characters written as `\uXXXX`: everything outside ASCII, plus DEL.
/// Other control characters reach the formatter already escaped.
fn needs_unicode_escape(c: char) -> bool {
    !c.is_ascii() || c == '\x7f'
}

/// Serialize `value` to compatible JSON text.
pub fn to_compat_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CompatFormatter);
    value.serialize(&mut ser)?;
    // The formatter only ever emits ASCII.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
