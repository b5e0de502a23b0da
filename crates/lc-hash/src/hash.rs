//! Digest construction for identity ids and content hashes.
//!
//! A digest input is an ordered tuple of rendered values joined with `:` and
//! hashed with MD5 (lowercase hex). Null values are omitted from the tuple
//! instead of rendered as empty fields, so `(a, None, b)` and `(a, b)` share a
//! digest. Persisted artifacts depend on this, so it must not change.

use chrono::{NaiveDateTime, Timelike};
use md5::{Digest, Md5};

/// Separator between rendered tuple parts.
pub const PART_SEPARATOR: &str = ":";

/// Rendering used for a value that was stringified before omission could apply.
pub const NONE_LITERAL: &str = "None";

/// MD5 of raw bytes as lowercase hex.
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// A value that can appear in a digest tuple.
///
/// `render` returns `None` for values that are dropped from the tuple.
pub trait HashPart {
    fn render(&self) -> Option<String>;
}

impl HashPart for str {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl HashPart for String {
    fn render(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl HashPart for i64 {
    fn render(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl HashPart for bool {
    fn render(&self) -> Option<String> {
        Some(render_bool(*self).to_string())
    }
}

impl HashPart for NaiveDateTime {
    fn render(&self) -> Option<String> {
        Some(render_datetime(self))
    }
}

impl<T: HashPart + ?Sized> HashPart for &T {
    fn render(&self) -> Option<String> {
        (**self).render()
    }
}

impl<T: HashPart> HashPart for Option<T> {
    fn render(&self) -> Option<String> {
        self.as_ref().and_then(HashPart::render)
    }
}

/// Canonical boolean rendering.
pub fn render_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Canonical timestamp rendering: `YYYY-MM-DD HH:MM:SS`, followed by
/// `.ffffff` only when the microsecond component is non-zero.
pub fn render_datetime(dt: &NaiveDateTime) -> String {
    let micros = dt.nanosecond() / 1_000 % 1_000_000;
    if micros == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        format!("{}.{:06}", dt.format("%Y-%m-%d %H:%M:%S"), micros)
    }
}

/// Ordered digest input.
///
/// ```
/// use lc_hash::HashInput;
///
/// let id = HashInput::new()
///     .part(&100_i64)
///     .part("device-1")
///     .part(&None::<String>)
///     .digest();
/// assert_eq!(id, lc_hash::md5_hex(b"100:device-1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashInput {
    parts: Vec<String>,
}

impl HashInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part; nulls are skipped.
    pub fn part<T: HashPart + ?Sized>(mut self, value: &T) -> Self {
        if let Some(rendered) = value.render() {
            self.parts.push(rendered);
        }
        self
    }

    /// Append a part that is always present; a null renders as `None`.
    pub fn stringified<T: HashPart + ?Sized>(mut self, value: &T) -> Self {
        self.parts
            .push(value.render().unwrap_or_else(|| NONE_LITERAL.to_string()));
        self
    }

    /// Number of parts that survived null omission.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The colon-joined tuple that gets hashed.
    pub fn joined(&self) -> String {
        self.parts.join(PART_SEPARATOR)
    }

    /// MD5 hex of the joined tuple.
    pub fn digest(&self) -> String {
        md5_hex(self.joined().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32, milli: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 2, 22)
            .unwrap()
            .and_hms_milli_opt(h, m, s, milli)
            .unwrap()
    }

    #[test]
    fn test_md5_hex_known_value() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_hex("Jambo people".as_bytes()),
            "2e962e16e56aaed080779ea915252cb2"
        );
    }

    #[test]
    fn test_render_datetime_fraction_only_when_nonzero() {
        assert_eq!(render_datetime(&dt(0, 12, 6, 0)), "2017-02-22 00:12:06");
        assert_eq!(
            render_datetime(&dt(0, 12, 6, 477)),
            "2017-02-22 00:12:06.477000"
        );
    }

    #[test]
    fn test_nulls_are_omitted() {
        let input = HashInput::new()
            .part("a")
            .part(&None::<i64>)
            .part(&Some(5_i64))
            .part(&false);
        assert_eq!(input.joined(), "a:5:False");
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_empty_string_is_kept() {
        let input = HashInput::new().part("a").part("");
        assert_eq!(input.joined(), "a:");
    }

    #[test]
    fn test_stringified_null_renders_none() {
        let input = HashInput::new()
            .stringified(&None::<NaiveDateTime>)
            .part("x");
        assert_eq!(input.joined(), "None:x");
    }

    #[test]
    fn test_row_hash_vectors() {
        let sms = HashInput::new()
            .part("123fgh")
            .part("sent")
            .part(&5_i64)
            .part(&9_i64)
            .part("4567895")
            .part(&false);
        assert_eq!(sms.digest(), "e97347ee50f9a5f1155061c096672498");

        let app = HashInput::new().part("123fgh").part(&false);
        assert_eq!(app.digest(), "a518d55eec549d7d8a88390e6ee860ef");

        let call = HashInput::new()
            .part("123fgh")
            .part("name")
            .part(&5_i64)
            .part("4567895")
            .part(&456_i64)
            .part(&false);
        assert_eq!(call.digest(), "83bafc501b555dfca04a3d37ca5eb573");
    }
}
