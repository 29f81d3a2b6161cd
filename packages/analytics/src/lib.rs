#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation queries and health metrics over the case store.
//!
//! Everything here is read-only. [`aggregation`] wraps the store's query
//! primitives, [`metrics`] turns counts into rates and the annual growth
//! projection, and [`api`] exposes the two query operations consumed by
//! outer layers.

pub mod aggregation;
pub mod api;
pub mod metrics;

use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Store query failed.
    #[error("Database error: {0}")]
    Database(#[from] vitalytics_database::DbError),

    /// A query parameter was rejected.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of what went wrong.
        message: String,
    },
}
