pub mod analysis;
pub mod reports;

pub use analysis::{
    analysis_summary, analyze_tables, generate_lote_tables, AnalysisOutcome, AnalysisService,
    AnalysisSummary, LoteTables, LoteWriteResult,
};
pub use reports::{
    cycle_summary_batch, generate_cycle_summary, generate_detailed_mapping, CycleSummaryRow,
};

use axum::{
    response::IntoResponse,
    http::StatusCode,
    Json
};
use crate::api::models::ApiResponse;

pub struct AppError(pub common::Error);

impl AppError {
    pub fn bad_request(message: String) -> Self {
        AppError(common::Error::InvalidInput(message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match &self.0 {
            common::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            e if e.is_data_error() => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ApiResponse::<()>::error(self.0.to_string()));
        (status_code, body).into_response()
    }
}

impl From<common::Error> for AppError {
    fn from(err: common::Error) -> Self {
        AppError(err)
    }
}
