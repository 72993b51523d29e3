use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::{verify_jwt, Claims};
use crate::error::ApiError;
use crate::AppState;

/// Caller context extracted from the bearer token.
///
/// A request without an `Authorization` header is an anonymous caller, not an
/// error; operations decide for themselves what anonymous callers get.
#[derive(Clone, Debug, Default)]
pub struct Caller {
    pub token_identifier: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&str> {
        self.token_identifier.as_deref()
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            token_identifier: Some(claims.sub),
        }
    }
}

/// JWT middleware that injects a [`Caller`] into every request.
/// A present but malformed or invalid token is rejected with 401.
pub async fn caller_identity_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)? {
        Some(token) => {
            let claims = verify_jwt(&token, &state.config.security.jwt_secret)
                .map_err(|e| ApiError::unauthorized(e.to_string()))?;
            Caller::from(claims)
        }
        None => {
            debug!("Anonymous request to {}", request.uri().path());
            Caller::anonymous()
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header; `None` when the header is absent
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim().to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
