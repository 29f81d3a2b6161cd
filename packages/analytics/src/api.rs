//! Query API: the two read-only operations exposed to outer layers.

use vitalytics_analytics_models::{ChartParams, ChartResponse, MetricResponse};
use vitalytics_database::CaseStore;

use crate::AnalyticsError;
use crate::aggregation::grouped_counts;
use crate::metrics::calculate_all_metrics;

/// Maximum length of a state filter (two-letter codes).
const STATE_CODE_LEN: usize = 2;

/// Lists the current metrics.
///
/// # Errors
///
/// Returns [`AnalyticsError::Database`] if a store query fails.
pub fn list_metrics(store: &dyn CaseStore) -> Result<Vec<MetricResponse>, AnalyticsError> {
    calculate_all_metrics(store)
}

/// Returns bucketed chart data along with an echo of `params`.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if the state filter is
/// longer than two characters, or [`AnalyticsError::Database`] if the store
/// query fails.
pub fn chart_data(
    store: &dyn CaseStore,
    params: &ChartParams,
) -> Result<ChartResponse, AnalyticsError> {
    if let Some(state) = &params.state
        && state.trim().chars().count() > STATE_CODE_LEN
    {
        return Err(AnalyticsError::InvalidParameter {
            message: format!("state must be a {STATE_CODE_LEN}-letter code, got {state:?}"),
        });
    }

    let data = grouped_counts(
        store,
        params.start_date,
        params.end_date,
        &params.group_by,
        params.state.as_deref(),
    )?;

    Ok(ChartResponse {
        filter_options: params.clone(),
        data,
    })
}
