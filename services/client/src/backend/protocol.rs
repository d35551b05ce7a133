//! Bodies exchanged with the analysis backend.

use serde::Deserialize;

/// Body of `POST /upload`. Success carries `filename`; failure carries `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    pub message: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// Error body of a refused `GET /analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
