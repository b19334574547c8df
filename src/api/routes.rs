use axum::{
    routing::{get, post, put},
    Router,
    extract::{Json, Multipart, State},
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{AppError, GenerateError, Result};
use crate::api::auth::{password_matches, AuthSession};
use crate::api::models::{
    ChatRequest, ChatResponse, CompletionBody, CredentialRequest, CredentialResponse,
    HealthResponse, LeadRequest, LoginRequest, LoginResponse, LogoutResponse, ResumeResponse,
    ScanRequest, ScanResponse,
};
use crate::api::response;
use crate::generator::Completion;
use crate::resume;
use crate::session::{ChatRole, ModelCache};
use crate::AppState;

/// Upper bound on one user action, across page fetch and every model attempt.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(90);

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/session/credential", put(credential_handler))
        .route("/api/scan", post(scan_handler))
        .route("/api/resume", post(resume_handler))
        .route("/api/chat", post(chat_handler).get(chat_history_handler))
        .route("/api/leads", get(list_leads_handler).post(add_lead_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> impl IntoResponse {
    response::success(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    if !password_matches(&state.config.access_password, &req.password) {
        return Err(AppError::Unauthorized);
    }

    let (session_id, active_sessions) = state.sessions.create();
    info!(%session_id, active_sessions, "session opened");
    Ok(response::success(LoginResponse { session_id }))
}

async fn logout_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
) -> impl IntoResponse {
    let ended = state.sessions.remove(&id);
    info!(session_id = %id, "session closed");
    response::success(LogoutResponse { ended })
}

async fn credential_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
    Json(req): Json<CredentialRequest>,
) -> Result<impl IntoResponse> {
    let has_own = state
        .sessions
        .with_session(&id, |session| {
            session.set_credential(req.api_key);
            session.credential.is_some()
        })
        .ok_or(AppError::Unauthorized)?;

    let source = if has_own {
        "session"
    } else if state.config.gemini_api_key.is_some() {
        "environment"
    } else {
        "none"
    };
    Ok(response::success(CredentialResponse { source }))
}

/// Session credential if set, else the environment one, else empty.
fn session_context(state: &AppState, id: &uuid::Uuid) -> Result<(String, ModelCache)> {
    state
        .sessions
        .with_session(id, |session| {
            let credential = session
                .credential
                .clone()
                .or_else(|| state.config.gemini_api_key.clone())
                .unwrap_or_default();
            (credential, session.model_cache.clone())
        })
        .ok_or(AppError::Unauthorized)
}

async fn with_timeout(fut: impl std::future::Future<Output = Completion>) -> Completion {
    match tokio::time::timeout(HANDLER_TIMEOUT, fut).await {
        Ok(completion) => completion,
        Err(_) => Completion::diagnostic(GenerateError::UpstreamUnavailable(format!(
            "request timed out after {:?}",
            HANDLER_TIMEOUT
        ))),
    }
}

async fn scan_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse> {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return Err(AppError::BadRequest("url must not be empty".to_string()));
    }

    info!(url = %url, "processing scan");
    let start_time = Instant::now();
    let (credential, cache) = session_context(&state, &id)?;
    let completion = with_timeout(state.generator.generate(&url, &credential, &cache)).await;
    info!(url = %url, elapsed = ?start_time.elapsed(), generated = completion.is_generated(), "scan finished");

    let status = if completion.is_generated() { "drafted" } else { "failed" };
    let lead = state
        .sessions
        .with_session(&id, |session| session.push_lead(&url, status))
        .ok_or(AppError::Unauthorized)?;

    Ok(response::success(ScanResponse {
        url,
        completion: CompletionBody::from(&completion),
        lead,
        scanned_at: Utc::now(),
    }))
}

async fn resume_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .ok_or_else(|| AppError::BadRequest("no file uploaded".to_string()))?;

    let file_name = field.file_name().map(str::to_string);
    let format = resume::detect_format(field.content_type(), file_name.as_deref())?;
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let text = resume::read_resume(format, bytes.to_vec()).await?;
    info!(file_name = ?file_name, ?format, chars = text.chars().count(), "resume extracted");

    let (credential, cache) = session_context(&state, &id)?;
    let completion = with_timeout(state.generator.analyze_resume(&text, &credential, &cache)).await;

    Ok(response::success(ResumeResponse {
        file_name,
        completion: CompletionBody::from(&completion),
    }))
}

async fn chat_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse> {
    if req.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let history = state
        .sessions
        .with_session(&id, |session| {
            session.push_chat(ChatRole::User, &req.message);
            session.chat.clone()
        })
        .ok_or(AppError::Unauthorized)?;

    let (credential, cache) = session_context(&state, &id)?;
    let completion = with_timeout(state.generator.chat(&history, &credential, &cache)).await;

    let history = state
        .sessions
        .with_session(&id, |session| {
            session.push_chat(ChatRole::Assistant, completion.text());
            session.chat.clone()
        })
        .ok_or(AppError::Unauthorized)?;

    Ok(response::success(ChatResponse {
        reply: CompletionBody::from(&completion),
        history,
    }))
}

async fn chat_history_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
) -> Result<impl IntoResponse> {
    let history = state
        .sessions
        .with_session(&id, |session| session.chat.clone())
        .ok_or(AppError::Unauthorized)?;
    Ok(response::success(history))
}

async fn list_leads_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
) -> Result<impl IntoResponse> {
    let leads = state
        .sessions
        .with_session(&id, |session| session.leads.clone())
        .ok_or(AppError::Unauthorized)?;
    Ok(response::success(leads))
}

async fn add_lead_handler(
    State(state): State<AppState>,
    AuthSession(id): AuthSession,
    Json(req): Json<LeadRequest>,
) -> Result<impl IntoResponse> {
    let identifier = req.identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::BadRequest("identifier must not be empty".to_string()));
    }
    let status = req.status.as_deref().unwrap_or("new");

    let lead = state
        .sessions
        .with_session(&id, |session| session.push_lead(identifier, status))
        .ok_or(AppError::Unauthorized)?;
    Ok(response::success(lead))
}
