// =============================================================================
// Bearer token authentication for the control API
// =============================================================================
//
// The expected token comes from `KLINE_ADMIN_TOKEN` and is re-read on every
// request. When the variable is unset or empty every authenticated route
// answers 403.
//
//   async fn handler(_auth: AuthBearer, ...) { ... }
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

pub const ADMIN_TOKEN_ENV: &str = "KLINE_ADMIN_TOKEN";

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn expected_token() -> Option<String> {
    std::env::var(ADMIN_TOKEN_ENV).ok().filter(|t| !t.is_empty())
}

/// Check a token presented outside the `Authorization` header, e.g. the
/// `?token=` query parameter of the WebSocket upgrade.
pub fn validate_token(token: &str) -> bool {
    expected_token().is_some_and(|expected| constant_time_eq(token.as_bytes(), expected.as_bytes()))
}

/// Extractor that admits the request only with `Authorization: Bearer <token>`
/// matching `KLINE_ADMIN_TOKEN`.
pub struct AuthBearer;

pub struct AuthRejection(&'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": self.0 }))).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(expected) = expected_token() else {
            warn!("{ADMIN_TOKEN_ENV} is not set, rejecting authenticated request");
            return Err(AuthRejection("server authentication not configured"));
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(AuthBearer),
            Some(_) => {
                warn!(path = %parts.uri.path(), "invalid admin token presented");
                Err(AuthRejection("invalid authorization token"))
            }
            None => {
                warn!(path = %parts.uri.path(), "missing or malformed Authorization header");
                Err(AuthRejection("missing authorization token"))
            }
        }
    }
}
