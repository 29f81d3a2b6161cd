//! Health metrics derived from store counts.
//!
//! [`calculate_all_metrics`] gathers the counts and [`build_metrics`] turns
//! them into the metric list. The list is empty when no cases are stored;
//! otherwise it always holds, in order, the mortality rate, the ICU
//! admission rate, the vaccination rate and the annual growth projection.

use std::collections::BTreeMap;

use vitalytics_analytics_models::{AnnualGrowthPoint, Metric, MetricResponse, ProjectionMetric};
use vitalytics_database::CaseStore;
use vitalytics_database_models::{CaseFilter, YearCount};

use crate::AnalyticsError;
use crate::aggregation::{total_count, total_count_where, yearly_counts};

/// Outcome code recorded for deaths.
pub const DEATH_OUTCOME_CODE: i32 = 2;

/// Raw counts the metrics are computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricInputs {
    /// All stored cases.
    pub total: u64,
    /// Cases with the death outcome.
    pub deaths: u64,
    /// Cases admitted to an ICU.
    pub icu_admitted: u64,
    /// Vaccinated cases.
    pub vaccinated: u64,
    /// Cases per year, ascending.
    pub yearly: Vec<YearCount>,
}

/// Reads the counts from `store` and builds the metric list.
///
/// # Errors
///
/// Returns [`AnalyticsError::Database`] if any store query fails.
pub fn calculate_all_metrics(store: &dyn CaseStore) -> Result<Vec<MetricResponse>, AnalyticsError> {
    let total = total_count(store)?;
    if total == 0 {
        log::debug!("No cases stored, skipping metrics");
        return Ok(Vec::new());
    }

    let inputs = MetricInputs {
        total,
        deaths: total_count_where(store, CaseFilter::OutcomeCode(DEATH_OUTCOME_CODE))?,
        icu_admitted: total_count_where(store, CaseFilter::IcuAdmitted)?,
        vaccinated: total_count_where(store, CaseFilter::Vaccinated)?,
        yearly: yearly_counts(store)?,
    };

    Ok(build_metrics(&inputs))
}

/// Builds the metric list from raw counts. Returns an empty list when
/// `inputs.total` is zero.
#[must_use]
pub fn build_metrics(inputs: &MetricInputs) -> Vec<MetricResponse> {
    let total = inputs.total;
    if total == 0 {
        return Vec::new();
    }

    vec![
        MetricResponse::Metric(Metric {
            name: "SRAG mortality rate".to_string(),
            value: format_rate(inputs.deaths, total),
            context: format!(
                "Based on {} deaths out of {total} cases.",
                inputs.deaths
            ),
        }),
        MetricResponse::Metric(Metric {
            name: "ICU admission rate".to_string(),
            value: format_rate(inputs.icu_admitted, total),
            context: format!(
                "Share of cases that required ICU admission ({} of {total}).",
                inputs.icu_admitted
            ),
        }),
        MetricResponse::Metric(Metric {
            name: "COVID-19 vaccination rate".to_string(),
            value: format_rate(inputs.vaccinated, total),
            context: format!(
                "Share of SRAG patients vaccinated against COVID-19 ({} of {total}).",
                inputs.vaccinated
            ),
        }),
        MetricResponse::Projection(ProjectionMetric {
            name: "Annual case growth".to_string(),
            context: "Percentage change in cases relative to the previous calendar year."
                .to_string(),
            data: project_annual_growth(&inputs.yearly),
        }),
    ]
}

/// Computes the year-over-year change for each year in `yearly`.
///
/// The change compares against calendar year `year - 1`, not the previous
/// entry: when that year is absent or has no cases the change is `None`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn project_annual_growth(yearly: &[YearCount]) -> Vec<AnnualGrowthPoint> {
    let by_year: BTreeMap<i32, u64> = yearly.iter().map(|y| (y.year, y.count)).collect();

    yearly
        .iter()
        .map(|y| {
            let percentage_change = y
                .year
                .checked_sub(1)
                .and_then(|prior| by_year.get(&prior))
                .filter(|&&prior| prior > 0)
                .map(|&prior| {
                    let change = (y.count as f64 - prior as f64) / prior as f64 * 100.0;
                    round2(change)
                });

            AnnualGrowthPoint {
                year: y.year,
                case_count: y.count,
                percentage_change,
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn format_rate(part: u64, total: u64) -> String {
    format!("{:.2}%", part as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
