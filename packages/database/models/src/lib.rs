#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Store query parameters and aggregate row types.
//!
//! These types describe what the aggregation layer asks of a
//! `CaseStore` and what it gets back. They are distinct from the
//! canonical ingestion types in `vitalytics_source_models` and the
//! API response types in `vitalytics_analytics_models`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Bucket granularity for grouped counts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GroupBy {
    /// Notification date truncated to the day.
    Day,
    /// Notification date truncated to the first day of the month.
    Month,
    /// Raw (uppercased) region code. Accepts `state` and `region`.
    #[serde(rename = "state", alias = "region")]
    #[strum(to_string = "state", serialize = "region")]
    Region,
}

/// Predicate for simple filtered counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFilter {
    /// Every stored case.
    All,
    /// Cases with the given outcome code.
    OutcomeCode(i32),
    /// Cases admitted to an ICU.
    IcuAdmitted,
    /// Vaccinated cases.
    Vaccinated,
}

/// Parameters for a bucketed count over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedCountQuery {
    /// First notification date included.
    pub start: NaiveDate,
    /// Last notification date included.
    pub end: NaiveDate,
    /// Bucket granularity.
    pub group_by: GroupBy,
    /// Optional region filter, always uppercased.
    pub region: Option<String>,
}

impl GroupedCountQuery {
    /// Creates an unfiltered query over `[start, end]`.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate, group_by: GroupBy) -> Self {
        Self {
            start,
            end,
            group_by,
            region: None,
        }
    }

    /// Restricts the query to one region. Blank values clear the filter.
    #[must_use]
    pub fn with_region(mut self, region: Option<&str>) -> Self {
        self.region = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_uppercase);
        self
    }
}

/// One chart bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    /// Bucket key: `YYYY-MM-DD` for day and month buckets, the region code
    /// otherwise.
    pub group: String,
    /// Number of cases in the bucket.
    pub count: u64,
}

/// Number of cases notified in one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    /// Calendar year.
    pub year: i32,
    /// Number of cases.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn group_by_parses_state_and_region_aliases() {
        assert_eq!(GroupBy::from_str("day").unwrap(), GroupBy::Day);
        assert_eq!(GroupBy::from_str("month").unwrap(), GroupBy::Month);
        assert_eq!(GroupBy::from_str("state").unwrap(), GroupBy::Region);
        assert_eq!(GroupBy::from_str("region").unwrap(), GroupBy::Region);
        assert!(GroupBy::from_str("week").is_err());
        assert_eq!(GroupBy::Region.to_string(), "state");
    }

    #[test]
    fn group_by_serde_uses_state() {
        assert_eq!(serde_json::to_string(&GroupBy::Region).unwrap(), "\"state\"");
        let parsed: GroupBy = serde_json::from_str("\"region\"").unwrap();
        assert_eq!(parsed, GroupBy::Region);
    }

    #[test]
    fn region_filter_is_uppercased() {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();

        let query = GroupedCountQuery::new(start, end, GroupBy::Day).with_region(Some(" sp "));
        assert_eq!(query.region.as_deref(), Some("SP"));

        let query = GroupedCountQuery::new(start, end, GroupBy::Day).with_region(Some(""));
        assert_eq!(query.region, None);
    }
}
