//! Principal extraction from request credentials.
//!
//! Every document row is keyed by principal, so the bearer token doubles
//! as the scoping key. In production the token would be validated (JWT or
//! a session table) before being trusted as a principal.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::AppState;

/// The authenticated principal owning the documents a request touches.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub String);

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").to_string();
                if token.is_empty() {
                    return Err((StatusCode::UNAUTHORIZED, "Empty bearer token"));
                }
                Ok(AuthPrincipal(token))
            }
            Some(_) => Err((
                StatusCode::UNAUTHORIZED,
                "Invalid authorization header format",
            )),
            None => {
                // Local development mode: no secret configured means
                // unauthenticated requests share one anonymous principal.
                if state.config.auth_secret.is_none() {
                    Ok(AuthPrincipal("anonymous".to_string()))
                } else {
                    Err((StatusCode::UNAUTHORIZED, "Missing authorization header"))
                }
            }
        }
    }
}
