use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

pub const SESSION_HEADER: &str = "x-session-id";

/// An authenticated session, identified by the `x-session-id` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthSession(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or(AppError::Unauthorized)?;

        state
            .sessions
            .with_session(&id, |_| ())
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthSession(id))
    }
}

/// Compares the typed password with the configured one.
pub fn password_matches(expected: &str, given: &str) -> bool {
    !expected.is_empty() && expected == given
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_configured_password_never_matches() {
        assert!(!password_matches("", ""));
        assert!(password_matches("hunter2", "hunter2"));
        assert!(!password_matches("hunter2", "hunter2 "));
    }
}
