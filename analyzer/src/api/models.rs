use crate::services::{AnalysisOutcome, AnalysisSummary};
use serde::{Deserialize, Serialize};

// Request models
#[derive(Debug, Deserialize)]
pub struct TablesQuery {
    pub column: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    pub tables: Option<Vec<String>>,
    pub strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoteRequest {
    pub reference_table: String,
    pub tables: Option<Vec<String>>,
    pub strategy: Option<String>,
}

// Response models
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub summary: AnalysisSummary,
    pub outcome: AnalysisOutcome,
}
