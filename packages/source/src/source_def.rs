//! Config-driven surveillance dataset definition.
//!
//! [`SourceDefinition`] captures the per-file quirks of a yearly dataset
//! (location, delimiter, text encoding, date formats, column names) in a
//! serializable struct. A single generic reader and normalizer handle every
//! file, so a new year is just a new TOML file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use vitalytics_source_models::{NormalizedBatch, RawRow};

use crate::normalize::normalize_batch;

/// Date formats tried, in order, when a definition does not override them.
///
/// Older files use `DD/MM/YYYY`, newer exports use ISO dates.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

/// A complete, config-driven dataset definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"srag_2021"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Notification year covered by the file, if known.
    #[serde(default)]
    pub year: Option<i32>,
    /// HTTP(S) URL or local file path of the CSV.
    pub url: String,
    /// Field delimiter (default: semicolon).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Text encoding of the file.
    #[serde(default)]
    pub encoding: TextEncoding,
    /// Compression applied to the file body.
    #[serde(default)]
    pub compressed: Option<Compression>,
    /// `chrono` date formats for the notification date, tried in order.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    /// Additional HTTP headers sent when downloading.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Source column names for each canonical field.
    #[serde(default)]
    pub fields: FieldMapping,
}

/// Text encoding of a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// ISO-8859-1 (every byte maps to one character).
    #[default]
    Latin1,
    /// UTF-8, falling back to ISO-8859-1 for fields that are not valid
    /// UTF-8.
    Utf8,
}

/// Compression format of a source file body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// gzip-compressed body.
    Gzip,
}

/// Maps source column names to canonical record fields.
///
/// The mapped columns form the read whitelist: every other column in the
/// file is discarded before a row is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Notification date column (required).
    pub notification_date: String,
    /// Region (state) code column.
    pub state_code: String,
    /// Sex column.
    pub sex: String,
    /// Age column.
    pub age: String,
    /// ICU admission flag column.
    pub icu_admitted: String,
    /// Outcome code column.
    pub outcome_code: String,
    /// Vaccination flag column.
    pub vaccinated: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            notification_date: "DT_NOTIFIC".to_string(),
            state_code: "SG_UF_NOT".to_string(),
            sex: "CS_SEXO".to_string(),
            age: "NU_IDADE_N".to_string(),
            icu_admitted: "UTI".to_string(),
            outcome_code: "EVOLUCAO".to_string(),
            vaccinated: "VACINA_COV".to_string(),
        }
    }
}

impl FieldMapping {
    /// Returns every mapped column name, required column first.
    #[must_use]
    pub fn whitelist(&self) -> [&str; 7] {
        [
            &self.notification_date,
            &self.state_code,
            &self.sex,
            &self.age,
            &self.icu_admitted,
            &self.outcome_code,
            &self.vaccinated,
        ]
    }

    /// Returns `true` if a column must be present in the file header.
    #[must_use]
    pub fn is_required(&self, column: &str) -> bool {
        column == self.notification_date
    }
}

fn default_delimiter() -> String {
    ";".to_string()
}

fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(ToString::to_string).collect()
}

impl SourceDefinition {
    /// Builds an ad-hoc definition for a URL or path using the default
    /// format hints. The id is derived from the file name.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let file_name = url
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(url);
        let id = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_lowercase();

        Self {
            id,
            name: url.to_string(),
            year: None,
            url: url.to_string(),
            delimiter: default_delimiter(),
            encoding: TextEncoding::default(),
            compressed: None,
            date_formats: default_date_formats(),
            headers: BTreeMap::new(),
            fields: FieldMapping::default(),
        }
    }

    /// Returns the unique source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the URL or path the source is read from.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.url
    }

    /// Returns `true` if the source is fetched over HTTP(S).
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Returns the delimiter as a single byte, defaulting to `;` when the
    /// configured delimiter is empty.
    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }

    /// Normalizes a batch of raw rows using this source's column mapping
    /// and date formats.
    #[must_use]
    pub fn normalize_batch(&self, rows: &[RawRow]) -> NormalizedBatch {
        normalize_batch(rows, &self.fields, &self.date_formats)
    }
}

/// Parses a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}
