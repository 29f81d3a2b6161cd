#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Metric and chart response types.
//!
//! These are the shapes returned by the query API: a list of headline
//! metrics (rates plus the annual growth projection) and bucketed chart
//! data with an echo of the filters that produced it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vitalytics_database_models::BucketCount;

/// A headline rate metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Display name.
    pub name: String,
    /// Formatted value, e.g. `"12.34%"`.
    pub value: String,
    /// Human-readable explanation including the raw counts.
    pub context: String,
}

/// One year of the annual growth projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualGrowthPoint {
    /// Calendar year.
    pub year: i32,
    /// Cases notified in `year`.
    pub case_count: u64,
    /// Change relative to `year - 1`, in percent, rounded to 2 decimals.
    /// `None` (serialized as `null`) when `year - 1` has no cases.
    pub percentage_change: Option<f64>,
}

/// A metric carrying a year-by-year series instead of a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMetric {
    /// Display name.
    pub name: String,
    /// Human-readable explanation.
    pub context: String,
    /// Points ordered ascending by year.
    pub data: Vec<AnnualGrowthPoint>,
}

/// Either kind of metric, serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricResponse {
    /// A single-value rate.
    Metric(Metric),
    /// A year-by-year series.
    Projection(ProjectionMetric),
}

impl MetricResponse {
    /// Returns the display name of the metric.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Metric(m) => &m.name,
            Self::Projection(p) => &p.name,
        }
    }
}

fn default_group_by() -> String {
    "day".to_string()
}

/// Parameters of a chart query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartParams {
    /// First notification date included.
    pub start_date: NaiveDate,
    /// Last notification date included.
    pub end_date: NaiveDate,
    /// `day`, `month` or `state`. Unknown values yield no buckets.
    #[serde(default = "default_group_by")]
    pub group_by: String,
    /// Optional two-letter state filter.
    #[serde(default)]
    pub state: Option<String>,
}

impl ChartParams {
    /// Creates parameters grouped by day with no state filter.
    #[must_use]
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            group_by: default_group_by(),
            state: None,
        }
    }
}

/// Bucketed chart data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartResponse {
    /// The filters that produced `data`, as received.
    pub filter_options: ChartParams,
    /// Buckets ordered ascending by key.
    pub data: Vec<BucketCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_serializes_null_change() {
        let metric = MetricResponse::Projection(ProjectionMetric {
            name: "Annual case growth".to_string(),
            context: "ctx".to_string(),
            data: vec![AnnualGrowthPoint {
                year: 2020,
                case_count: 100,
                percentage_change: None,
            }],
        });

        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["data"][0]["case_count"], 100);
        assert!(json["data"][0]["percentage_change"].is_null());
        assert!(json.get("value").is_none());
    }

    #[test]
    fn metric_serializes_untagged() {
        let metric = MetricResponse::Metric(Metric {
            name: "Mortality".to_string(),
            value: "50.00%".to_string(),
            context: "ctx".to_string(),
        });

        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["value"], "50.00%");
        assert_eq!(metric.name(), "Mortality");
    }

    #[test]
    fn chart_params_default_to_day() {
        let params: ChartParams =
            serde_json::from_str(r#"{"start_date":"2021-01-01","end_date":"2021-12-31"}"#).unwrap();
        assert_eq!(params.group_by, "day");
        assert_eq!(params.state, None);
    }
}
