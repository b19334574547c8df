use serde::Serialize;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;

/// Envelope shared by every endpoint: `data` on success, `meta.message` on failure.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    pub status: &'static str,
    pub status_code: u16,
    pub timestamp: String,
    pub message: Option<String>,
}

fn meta(status: StatusCode, message: Option<String>) -> ResponseMeta {
    ResponseMeta {
        status: if status.is_success() { "success" } else { "error" },
        status_code: status.as_u16(),
        timestamp: Utc::now().to_rfc3339(),
        message,
    }
}

pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    let body = ApiResponse {
        data: Some(data),
        meta: meta(StatusCode::OK, None),
    };
    (StatusCode::OK, Json(body))
}

pub fn error<T>(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiResponse<T>>) {
    let body = ApiResponse {
        data: None,
        meta: meta(status, Some(message.into())),
    };
    (status, Json(body))
}

/// Escapes model output so it can be dropped into an HTML page as text.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
