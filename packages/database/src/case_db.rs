//! `DuckDB`-backed case storage.
//!
//! All cases live in a single `cases` table. Every row carries the
//! `source_id` it was loaded from so that an abandoned source can be
//! removed again, and an `id` drawn from the `cases_id_seq` sequence that
//! [`CaseStore::reset`] restarts.

use std::path::Path;

use duckdb::Connection;
use vitalytics_database_models::{BucketCount, CaseFilter, GroupBy, GroupedCountQuery, YearCount};
use vitalytics_source_models::CaseRecord;

use crate::{CaseStore, DbError};

/// Number of rows per INSERT statement (`DuckDB` handles large batches well).
const CHUNK_SIZE: usize = 5_000;

/// Number of bound parameters per inserted row.
const COLUMNS_PER_ROW: usize = 8;

const CREATE_SCHEMA: &str = "
    CREATE SEQUENCE IF NOT EXISTS cases_id_seq START 1;

    CREATE TABLE IF NOT EXISTS cases (
        id BIGINT NOT NULL DEFAULT nextval('cases_id_seq'),
        source_id TEXT NOT NULL,
        notification_date DATE NOT NULL,
        state_code TEXT,
        sex TEXT,
        age INTEGER,
        icu_admitted BOOLEAN NOT NULL,
        outcome_code INTEGER,
        vaccinated BOOLEAN NOT NULL
    );";

/// Case store over a single `DuckDB` connection.
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    /// Opens (or creates) the store at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "SET threads = 4;
             SET memory_limit = '512MB';",
        )?;

        Self::from_connection(conn)
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(Self { conn })
    }

    /// Returns the number of rows stored per source, ordered by source id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn source_counts(&self) -> Result<Vec<(String, u64)>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_id, COUNT(*) FROM cases GROUP BY source_id ORDER BY source_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (source_id, count) = row?;
            counts.push((source_id, to_u64(count)?));
        }
        Ok(counts)
    }
}

impl CaseStore for DuckDbStore {
    fn reset(&mut self) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS cases;
             DROP SEQUENCE IF EXISTS cases_id_seq;",
        )?;
        tx.execute_batch(CREATE_SCHEMA)?;
        tx.commit()?;

        log::info!("Case store reset");
        Ok(())
    }

    fn insert_batch(&mut self, source_id: &str, records: &[CaseRecord]) -> Result<u64, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut total_inserted = 0u64;

        for chunk in records.chunks(CHUNK_SIZE) {
            let mut sql = String::from(
                "INSERT INTO cases (
                    source_id, notification_date, state_code, sex, age,
                    icu_admitted, outcome_code, vaccinated
                ) VALUES ",
            );

            for i in 0..chunk.len() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str("(?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?)");
            }

            let mut stmt = tx.prepare(&sql)?;
            let mut param_idx = 1usize;

            for record in chunk {
                stmt.raw_bind_parameter(param_idx, source_id)?;
                stmt.raw_bind_parameter(param_idx + 1, record.notification_date.to_string())?;
                stmt.raw_bind_parameter(param_idx + 2, record.state_code.as_deref())?;
                stmt.raw_bind_parameter(param_idx + 3, record.sex.as_deref())?;
                stmt.raw_bind_parameter(param_idx + 4, record.age)?;
                stmt.raw_bind_parameter(param_idx + 5, record.icu_admitted)?;
                stmt.raw_bind_parameter(param_idx + 6, record.outcome_code)?;
                stmt.raw_bind_parameter(param_idx + 7, record.vaccinated)?;

                param_idx += COLUMNS_PER_ROW;
            }

            let rows = stmt.raw_execute()?;
            total_inserted += u64::try_from(rows).unwrap_or(0);
        }

        tx.commit()?;
        Ok(total_inserted)
    }

    fn discard_source(&mut self, source_id: &str) -> Result<u64, DbError> {
        let tx = self.conn.transaction()?;
        let rows = tx.execute("DELETE FROM cases WHERE source_id = ?", [source_id])?;
        tx.commit()?;

        Ok(u64::try_from(rows).unwrap_or(0))
    }

    fn count(&self, filter: CaseFilter) -> Result<u64, DbError> {
        let (sql, outcome) = match filter {
            CaseFilter::All => ("SELECT COUNT(*) FROM cases", None),
            CaseFilter::OutcomeCode(code) => {
                ("SELECT COUNT(*) FROM cases WHERE outcome_code = ?", Some(code))
            }
            CaseFilter::IcuAdmitted => ("SELECT COUNT(*) FROM cases WHERE icu_admitted", None),
            CaseFilter::Vaccinated => ("SELECT COUNT(*) FROM cases WHERE vaccinated", None),
        };

        let mut stmt = self.conn.prepare(sql)?;
        let count: i64 = match outcome {
            Some(code) => stmt.query_row([code], |row| row.get(0))?,
            None => stmt.query_row([], |row| row.get(0))?,
        };

        to_u64(count)
    }

    fn group_count(&self, query: &GroupedCountQuery) -> Result<Vec<BucketCount>, DbError> {
        let (bucket, extra_filter) = match query.group_by {
            GroupBy::Day => ("strftime(notification_date, '%Y-%m-%d')", ""),
            GroupBy::Month => (
                "strftime(date_trunc('month', notification_date), '%Y-%m-%d')",
                "",
            ),
            GroupBy::Region => ("state_code", " AND state_code IS NOT NULL"),
        };

        let mut sql = format!(
            "SELECT {bucket} AS bucket, COUNT(*) AS n
             FROM cases
             WHERE notification_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE){extra_filter}"
        );

        let mut params = vec![query.start.to_string(), query.end.to_string()];
        if let Some(region) = &query.region {
            sql.push_str(" AND state_code = ?");
            params.push(region.to_uppercase());
        }
        sql.push_str(" GROUP BY bucket ORDER BY bucket");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut buckets = Vec::new();
        for row in rows {
            let (group, count) = row?;
            buckets.push(BucketCount {
                group,
                count: to_u64(count)?,
            });
        }

        Ok(buckets)
    }

    fn year_count(&self) -> Result<Vec<YearCount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(year(notification_date) AS INTEGER) AS y, COUNT(*)
             FROM cases
             WHERE notification_date IS NOT NULL
             GROUP BY y
             ORDER BY y",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut years = Vec::new();
        for row in rows {
            let (year, count) = row?;
            years.push(YearCount {
                year,
                count: to_u64(count)?,
            });
        }

        Ok(years)
    }
}

fn to_u64(count: i64) -> Result<u64, DbError> {
    u64::try_from(count).map_err(|e| DbError::Conversion {
        message: format!("negative count {count}: {e}"),
    })
}
