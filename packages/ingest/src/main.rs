#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the SRAG ingestion and metrics tool.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use vitalytics_analytics::api::{chart_data, list_metrics};
use vitalytics_analytics_models::ChartParams;
use vitalytics_cli_utils::IndicatifProgress;
use vitalytics_database::db;
use vitalytics_ingest::{RunProgress, all_sources, enabled_sources, run_ingestion, sources_from_urls};
use vitalytics_ingest_models::{DEFAULT_CHUNK_SIZE, IngestOptions, IngestReport, SourceStatus};
use vitalytics_source::source_def::SourceDefinition;
use vitalytics_source::transport::DefaultTransport;

#[derive(Parser)]
#[command(
    name = "vitalytics_ingest",
    about = "SRAG surveillance data ingestion and metrics tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the case store and ingest all configured sources
    SyncAll {
        /// Comma-separated list of source IDs to ingest (overrides `VITALYTICS_SOURCES` env var)
        #[arg(long)]
        sources: Option<String>,
        /// Ingest these URLs or paths instead of the configured sources (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,
        /// Maximum number of rows per chunk
        #[arg(long, env = "VITALYTICS_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// List all configured data sources
    Sources,
    /// Print the current metrics as JSON
    Metrics,
    /// Print bucketed chart data as JSON
    Chart {
        /// First notification date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last notification date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Bucket by `day`, `month` or `state`
        #[arg(long, default_value = "day")]
        group_by: String,
        /// Two-letter state filter (e.g. SP, RJ)
        #[arg(long)]
        state: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = vitalytics_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sources => {
            let sources = all_sources();
            println!("{:<12} {:<6} NAME", "ID", "YEAR");
            println!("{}", "-".repeat(50));
            for source in &sources {
                let year = source.year.map_or_else(String::new, |y| y.to_string());
                println!("{:<12} {year:<6} {}", source.id(), source.name());
            }
        }
        Commands::SyncAll {
            sources,
            urls,
            chunk_size,
        } => {
            let sources = if urls.is_empty() {
                enabled_sources(sources)
            } else {
                sources_from_urls(&urls)
            };
            log::info!(
                "Ingesting {} source(s): {}",
                sources.len(),
                sources
                    .iter()
                    .map(SourceDefinition::id)
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let mut store = db::open_from_env()?;
            let transport = DefaultTransport::new()?;
            let progress = RunProgress {
                sources: IndicatifProgress::steps_bar(&multi, "Sources", sources.len() as u64),
                rows: IndicatifProgress::records_bar(&multi, "Rows"),
            };

            let report = run_ingestion(
                &mut store,
                &transport,
                &sources,
                &IngestOptions { chunk_size },
                &progress,
            )
            .await?;

            print_summary(&report);
        }
        Commands::Metrics => {
            let store = db::open_from_env()?;
            let metrics = list_metrics(&store)?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Commands::Chart {
            start,
            end,
            group_by,
            state,
        } => {
            let store = db::open_from_env()?;
            let params = ChartParams {
                start_date: start,
                end_date: end,
                group_by,
                state,
            };
            let response = chart_data(&store, &params)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn print_summary(report: &IngestReport) {
    println!();
    println!("{:<24} {:<20} {:>12} {:>10}", "SOURCE", "STATUS", "ROWS", "DROPPED");
    println!("{}", "-".repeat(70));
    for source in &report.sources {
        let status = match &source.status {
            SourceStatus::Completed => "completed".to_string(),
            SourceStatus::Failed { kind, .. } => kind.to_string(),
        };
        println!(
            "{:<24} {status:<20} {:>12} {:>10}",
            source.source_id, source.rows_committed, source.rows_dropped
        );
    }
    println!("{}", "-".repeat(70));
    println!(
        "Grand total: {} rows from {}/{} sources in {:.1}s",
        report.grand_total,
        report.completed_count(),
        report.sources.len(),
        report.duration.as_secs_f64()
    );

    for failed in report.failed() {
        if let SourceStatus::Failed { message, .. } = &failed.status {
            println!("  {} ({}): {message}", failed.source_id, failed.location);
        }
    }
}
