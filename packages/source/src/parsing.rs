//! Shared parsing utilities for raw surveillance fields.
//!
//! Date, flag, and integer coercion plus ISO-8859-1 text decoding.

use chrono::{Datelike, NaiveDate};

use crate::source_def::TextEncoding;

/// Years accepted by [`parse_date`]. `%Y` accepts any number of digits,
/// so two-digit years such as `05/01/21` would otherwise parse as year 21.
const VALID_YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Parses a date trying each format in order. The first format that
/// parses wins, even if a later format would also match. Dates whose year
/// is not four digits are rejected.
#[must_use]
pub fn parse_date<S: AsRef<str>>(s: &str, formats: &[S]) -> Option<NaiveDate> {
    let s = s.trim();
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(s, fmt.as_ref())
            .ok()
            .filter(|d| VALID_YEARS.contains(&d.year()))
    })
}

/// Maps a raw flag to a boolean: exactly the numeric value 1 is `true`,
/// anything else (0, 2, 9, blank, text) is `false`.
#[must_use]
pub fn parse_flag(value: Option<&str>) -> bool {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .is_some_and(|n| (n - 1.0).abs() < f64::EPSILON)
}

/// Coerces a raw value to an integer. Accepts integral decimals such as
/// `"2.0"`. Returns `None` for missing, fractional, or non-numeric values.
#[must_use]
pub fn parse_integer(value: Option<&str>) -> Option<i32> {
    let v = value?.trim();
    if let Ok(n) = v.parse::<i32>() {
        return Some(n);
    }
    let f = v.parse::<f64>().ok()?;
    if !f.is_finite() || f.fract() != 0.0 || f < f64::from(i32::MIN) || f > f64::from(i32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(f as i32)
}

/// Decodes ISO-8859-1 bytes. Every byte maps to the code point of the same
/// value, so this never fails.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Decodes a raw field according to the source's declared encoding.
#[must_use]
pub fn decode_field(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Latin1 => decode_latin1(bytes),
        TextEncoding::Utf8 => std::str::from_utf8(bytes)
            .map_or_else(|_| decode_latin1(bytes), ToString::to_string),
    }
}
