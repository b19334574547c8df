use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::response::escape_html;
use crate::error::GenerateError;
use crate::generator::Completion;
use crate::session::{ChatMessage, LeadRecord};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub ended: bool,
}

#[derive(Deserialize)]
pub struct CredentialRequest {
    pub api_key: Option<String>,
}

#[derive(Serialize)]
pub struct CredentialResponse {
    /// `session`, `environment` or `none`.
    pub source: &'static str,
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub url: String,
    pub completion: CompletionBody,
    pub lead: LeadRecord,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ResumeResponse {
    pub file_name: Option<String>,
    pub completion: CompletionBody,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: CompletionBody,
    pub history: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct LeadRequest {
    pub identifier: String,
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// A completion as sent to clients: raw text plus an escaped copy for HTML display.
#[derive(Debug, Serialize)]
pub struct CompletionBody {
    pub text: String,
    pub html: String,
    pub model: Option<String>,
    pub error: Option<GenerateError>,
}

impl From<&Completion> for CompletionBody {
    fn from(completion: &Completion) -> Self {
        CompletionBody {
            text: completion.text().to_string(),
            html: escape_html(completion.text()),
            model: completion.model().map(str::to_string),
            error: completion.error().cloned(),
        }
    }
}
