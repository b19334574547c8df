use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to fetch data: {0}")]
    FetchError(String),

    #[error("Error parsing content: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedMedia(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::FetchError(_) => StatusCode::BAD_REQUEST,
            AppError::ParseError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        response::error::<()>(status, self.to_string()).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of a single generation attempt. None of these reach the caller
/// as a fault; they end up as the text of a diagnostic completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("Error: no API key is configured. Set a Gemini API key for this session.")]
    MissingCredential,

    #[error("Could not read {0}. Please check it and try again.")]
    FetchFailed(String),

    #[error("Error: could not connect to the AI service: {0}")]
    UpstreamUnavailable(String),

    #[error("Error: the AI service rejected the request for model {model} (HTTP {status}): {body}")]
    UpstreamRejected { model: String, status: u16, body: String },

    #[error("Error: the AI service lists no model supporting {0}")]
    NoCapableModel(String),

    #[error("Error: the AI service returned no candidates")]
    NoCandidates,
}

impl GenerateError {
    /// Stable machine-readable name for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::MissingCredential => "missing_credential",
            GenerateError::FetchFailed(_) => "fetch_failed",
            GenerateError::UpstreamUnavailable(_) => "upstream_unavailable",
            GenerateError::UpstreamRejected { .. } => "upstream_rejected",
            GenerateError::NoCapableModel(_) => "no_capable_model",
            GenerateError::NoCandidates => "no_candidates",
        }
    }
}

impl serde::Serialize for GenerateError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.kind())
    }
}
