#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raw row and canonical case record types.
//!
//! Every surveillance dataset (one CSV per notification year) is read into
//! [`RawRow`]s keyed by the source column names, and normalized into
//! [`CaseRecord`]s that the store persists.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of a source file, restricted to the whitelisted columns.
///
/// Values are kept as the raw text found in the file. Blank cells are
/// reported as missing by [`RawRow::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    fields: BTreeMap<String, String>,
}

impl RawRow {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Sets the raw value for a column.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Builder-style variant of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns the trimmed value for a column, or `None` if the column is
    /// absent or blank.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Number of columns present in this row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the row carries no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A surveillance case normalized to the canonical schema.
///
/// `notification_date` is the only required field; rows without a
/// parseable date never become a `CaseRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    /// Date the case was notified.
    pub notification_date: NaiveDate,
    /// Two-letter region (state) code, uppercased.
    pub state_code: Option<String>,
    /// Sex as reported by the source, unvalidated.
    pub sex: Option<String>,
    /// Age as reported by the source.
    pub age: Option<i32>,
    /// Whether the patient was admitted to an ICU.
    pub icu_admitted: bool,
    /// Case outcome code (e.g. `2` = death). `None` when missing or
    /// non-numeric.
    pub outcome_code: Option<i32>,
    /// Whether the patient was vaccinated.
    pub vaccinated: bool,
}

impl CaseRecord {
    /// Creates a record with only the notification date set.
    #[must_use]
    pub const fn on(notification_date: NaiveDate) -> Self {
        Self {
            notification_date,
            state_code: None,
            sex: None,
            age: None,
            icu_admitted: false,
            outcome_code: None,
            vaccinated: false,
        }
    }
}

/// Output of normalizing one raw batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    /// Records that survived normalization, in input order.
    pub records: Vec<CaseRecord>,
    /// Rows excluded because no date format matched.
    pub dropped: u64,
}
