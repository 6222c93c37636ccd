use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::models::{AnalysisRequest, AnalysisResponse, ApiResponse, LoteRequest, TablesQuery};
use crate::models::RecoveryStrategy;
use crate::services::{analysis_summary, AnalysisService, AppError, LoteWriteResult};

fn parse_strategy(strategy: Option<&str>) -> Result<Option<RecoveryStrategy>, AppError> {
    strategy
        .map(|s| s.parse::<RecoveryStrategy>())
        .transpose()
        .map_err(AppError::from)
}

pub async fn list_tables(
    Query(params): Query<TablesQuery>,
    State(service): State<Arc<AnalysisService>>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let column = params
        .column
        .unwrap_or_else(|| service.config().time_column.clone());
    let tables = service.discover_tables(&column).await?;
    Ok(Json(ApiResponse::success(tables)))
}

pub async fn run_analysis(
    State(service): State<Arc<AnalysisService>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<ApiResponse<AnalysisResponse>>, AppError> {
    let strategy = parse_strategy(request.strategy.as_deref())?;
    let outcome = service.run_analysis(request.tables, strategy).await?;
    let summary = analysis_summary(&outcome);

    Ok(Json(ApiResponse::success(AnalysisResponse { summary, outcome })))
}

pub async fn create_lote_tables(
    State(service): State<Arc<AnalysisService>>,
    Json(request): Json<LoteRequest>,
) -> Result<Json<ApiResponse<LoteWriteResult>>, AppError> {
    if request.reference_table.trim().is_empty() {
        return Err(AppError::bad_request("reference_table must not be empty".into()));
    }
    let strategy = parse_strategy(request.strategy.as_deref())?;

    let tables = request.tables.map(|mut tables| {
        if !tables.contains(&request.reference_table) {
            tables.push(request.reference_table.clone());
        }
        tables
    });

    let outcome = service.run_analysis(tables, strategy).await?;
    let lote = service.lote_tables(&outcome, &request.reference_table)?;
    let written = service.persist_lote_tables(&lote).await?;

    info!(
        reference = %written.reference_table,
        summary_rows = written.summary_rows,
        detail_rows = written.detail_rows,
        "LOTE tables written"
    );
    Ok(Json(ApiResponse::success(written)))
}

// Define all API routes
pub fn routes(service: Arc<AnalysisService>) -> Router {
    Router::new()
        .route("/api/tables", get(list_tables))
        .route("/api/analysis", post(run_analysis))
        .route("/api/lote", post(create_lote_tables))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
