pub mod api;
pub mod models;
pub mod processor;
pub mod services;
pub mod storage;
pub mod utils;

use common::config::Settings;
use common::{Error, Result};
use models::RecoveryStrategy;
use services::{analysis_summary, AnalysisService, AnalysisSummary};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        eprintln!("A tracing subscriber is already installed");
    }
}

#[derive(Debug, Default, Clone)]
pub struct AnalyzeOptions {
    pub strategy: Option<String>,
    pub tables: Option<Vec<String>>,
    pub reference_table: Option<String>,
}

/// Analyzes the configured tables and, given a reference table, writes the
/// LOTE tables back to the store.
pub async fn run_analysis_pipeline(
    config_path: &str,
    options: AnalyzeOptions,
) -> Result<AnalysisSummary> {
    let settings = Settings::new(config_path)?;
    let service = AnalysisService::from_settings(&settings)?;

    let strategy = options.strategy.as_deref().map(str::parse::<RecoveryStrategy>).transpose()?;
    let mut tables = options.tables;
    if let (Some(list), Some(reference)) = (tables.as_mut(), options.reference_table.as_ref()) {
        if !list.contains(reference) {
            list.push(reference.clone());
        }
    }

    let outcome = service.run_analysis(tables, strategy).await?;
    let summary = analysis_summary(&outcome);

    for (name, detail) in &summary.table_details {
        match &detail.error_message {
            Some(message) => warn!(table = %name, error = %message, "Table failed analysis"),
            None => info!(table = %name, cycles = detail.cycles_found, "Table analyzed"),
        }
    }
    for reason in &outcome.reconciliation.mismatch_reasons {
        warn!(%reason, "Time sequences differ");
    }
    info!(
        total_tables = summary.total_tables,
        tables_with_errors = summary.tables_with_errors,
        total_cycles = summary.total_cycles,
        time_matched = summary.time_matched,
        "Analysis summary"
    );

    if let Some(reference) = options.reference_table.as_deref() {
        let lote = service.lote_tables(&outcome, reference)?;
        let written = service.persist_lote_tables(&lote).await?;
        info!(
            summary_table = %written.summary_table,
            detail_table = %written.detail_table,
            cycles = written.summary_rows,
            samples = written.detail_rows,
            "LOTE tables persisted"
        );
    }

    Ok(summary)
}

/// Serves the HTTP API until the process is stopped.
pub async fn run_api_server(config_path: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let service = Arc::new(AnalysisService::from_settings(&settings)?);

    let api_router = api::routes(Arc::clone(&service));

    let addr = SocketAddr::from(([127, 0, 0, 1], settings.api_port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Cycle analyzer API listening");

    axum::serve(listener, api_router).await.map_err(|e| {
        error!(error = %e, "API server stopped");
        Error::Io(e)
    })
}
