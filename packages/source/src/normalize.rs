//! Maps raw row batches to canonical case records.
//!
//! Pure transformation with no I/O. Rows whose notification date cannot be
//! parsed with any configured format are dropped and counted; every other
//! field is coerced leniently and never causes a rejection.

use vitalytics_source_models::{CaseRecord, NormalizedBatch, RawRow};

use crate::parsing::{parse_date, parse_flag, parse_integer};
use crate::source_def::FieldMapping;

/// Normalizes one raw batch.
///
/// Output records keep the input order.
#[must_use]
pub fn normalize_batch<S: AsRef<str>>(
    rows: &[RawRow],
    fields: &FieldMapping,
    date_formats: &[S],
) -> NormalizedBatch {
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0u64;

    for row in rows {
        match normalize_row(row, fields, date_formats) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!(
            "Dropped {dropped}/{} rows with unparseable {}",
            rows.len(),
            fields.notification_date
        );
    }

    NormalizedBatch { records, dropped }
}

/// Normalizes a single row. Returns `None` when the notification date is
/// missing or matches none of the formats.
#[must_use]
pub fn normalize_row<S: AsRef<str>>(
    row: &RawRow,
    fields: &FieldMapping,
    date_formats: &[S],
) -> Option<CaseRecord> {
    let notification_date = parse_date(row.get(&fields.notification_date)?, date_formats)?;

    Some(CaseRecord {
        notification_date,
        state_code: row.get(&fields.state_code).map(str::to_uppercase),
        sex: row.get(&fields.sex).map(String::from),
        age: parse_integer(row.get(&fields.age)),
        icu_admitted: parse_flag(row.get(&fields.icu_admitted)),
        outcome_code: parse_integer(row.get(&fields.outcome_code)),
        vaccinated: parse_flag(row.get(&fields.vaccinated)),
    })
}
