//! Read-only count queries.

use std::str::FromStr;

use chrono::NaiveDate;
use vitalytics_database::CaseStore;
use vitalytics_database_models::{BucketCount, CaseFilter, GroupBy, GroupedCountQuery, YearCount};

use crate::AnalyticsError;

/// Total number of stored cases.
///
/// # Errors
///
/// Returns [`AnalyticsError::Database`] if the store query fails.
pub fn total_count(store: &dyn CaseStore) -> Result<u64, AnalyticsError> {
    total_count_where(store, CaseFilter::All)
}

/// Number of stored cases matching `filter`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Database`] if the store query fails.
pub fn total_count_where(store: &dyn CaseStore, filter: CaseFilter) -> Result<u64, AnalyticsError> {
    Ok(store.count(filter)?)
}

/// Counts cases notified in `[start, end]`, bucketed by `group_by`
/// (`day`, `month`, `state` or `region`), optionally restricted to one
/// region.
///
/// An unrecognized `group_by` yields an empty list rather than an error.
/// `state` buckets leave out cases with no region code, so their sum can
/// be lower than the total for the same range.
///
/// # Errors
///
/// Returns [`AnalyticsError::Database`] if the store query fails.
pub fn grouped_counts(
    store: &dyn CaseStore,
    start: NaiveDate,
    end: NaiveDate,
    group_by: &str,
    region: Option<&str>,
) -> Result<Vec<BucketCount>, AnalyticsError> {
    let Ok(group_by) = GroupBy::from_str(group_by) else {
        log::debug!("Unknown group_by {group_by:?}, returning no buckets");
        return Ok(Vec::new());
    };

    let query = GroupedCountQuery::new(start, end, group_by).with_region(region);
    Ok(store.group_count(&query)?)
}

/// Cases per calendar year, ascending by year.
///
/// # Errors
///
/// Returns [`AnalyticsError::Database`] if the store query fails.
pub fn yearly_counts(store: &dyn CaseStore) -> Result<Vec<YearCount>, AnalyticsError> {
    Ok(store.year_count()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use vitalytics_database::case_db::DuckDbStore;
    use vitalytics_source_models::CaseRecord;

    use super::*;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn store_with(records: &[CaseRecord]) -> DuckDbStore {
        let mut store = DuckDbStore::open_in_memory().unwrap();
        store.insert_batch("test", records).unwrap();
        store
    }

    fn sample() -> DuckDbStore {
        let in_state = |d, s: &str| CaseRecord {
            state_code: Some(s.to_string()),
            ..CaseRecord::on(d)
        };
        store_with(&[
            in_state(date(2021, 3, 2), "SP"),
            in_state(date(2021, 3, 2), "RJ"),
            in_state(date(2021, 3, 15), "SP"),
            in_state(date(2021, 4, 1), "SP"),
            in_state(date(2021, 5, 1), "PE"),
            CaseRecord::on(date(2021, 3, 20)),
        ])
    }

    #[test]
    fn unknown_group_by_is_empty() {
        let store = sample();
        let buckets =
            grouped_counts(&store, date(2021, 1, 1), date(2021, 12, 31), "week", None).unwrap();
        assert!(buckets.is_empty());
    }

    #[test]
    fn day_buckets_are_sorted_and_within_range() {
        let store = sample();
        let start = date(2021, 3, 2);
        let end = date(2021, 4, 1);
        let buckets = grouped_counts(&store, start, end, "day", None).unwrap();

        let keys: Vec<&str> = buckets.iter().map(|b| b.group.as_str()).collect();
        assert_eq!(
            keys,
            vec!["2021-03-02", "2021-03-15", "2021-03-20", "2021-04-01"]
        );
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(buckets.iter().all(|b| {
            let d = NaiveDate::parse_from_str(&b.group, "%Y-%m-%d").unwrap();
            d >= start && d <= end
        }));
    }

    #[test]
    fn state_buckets_use_uppercase_keys() {
        let store = sample();
        let buckets =
            grouped_counts(&store, date(2021, 1, 1), date(2021, 12, 31), "state", None).unwrap();

        let pairs: Vec<(&str, u64)> = buckets.iter().map(|b| (b.group.as_str(), b.count)).collect();
        assert_eq!(pairs, vec![("PE", 1), ("RJ", 1), ("SP", 3)]);
    }

    #[test]
    fn state_buckets_leave_out_cases_without_region() {
        let store = sample();
        let (start, end) = (date(2021, 1, 1), date(2021, 12, 31));
        let by_state = grouped_counts(&store, start, end, "state", None).unwrap();
        let by_day = grouped_counts(&store, start, end, "day", None).unwrap();

        let state_total: u64 = by_state.iter().map(|b| b.count).sum();
        let day_total: u64 = by_day.iter().map(|b| b.count).sum();
        assert_eq!(state_total, 5);
        assert_eq!(day_total, 6);
    }

    #[test]
    fn month_buckets_with_lowercase_region_filter() {
        let store = sample();
        let buckets =
            grouped_counts(&store, date(2021, 1, 1), date(2021, 12, 31), "month", Some("sp"))
                .unwrap();

        let pairs: Vec<(&str, u64)> = buckets.iter().map(|b| (b.group.as_str(), b.count)).collect();
        assert_eq!(pairs, vec![("2021-03-01", 2), ("2021-04-01", 1)]);
    }

    #[test]
    fn counts_totals_and_years() {
        let store = sample();
        assert_eq!(total_count(&store).unwrap(), 6);
        assert_eq!(
            total_count_where(&store, CaseFilter::IcuAdmitted).unwrap(),
            0
        );
        assert_eq!(
            yearly_counts(&store).unwrap(),
            vec![YearCount {
                year: 2021,
                count: 6
            }]
        );
    }
}
