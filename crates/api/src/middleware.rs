use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use jobhub_auth::TokenSigner;
use jobhub_onboarding::UserStore;

use crate::app::errors;
use crate::context::AuthContext;

#[derive(Clone)]
pub struct AuthState {
    pub signer: Arc<dyn TokenSigner>,
    pub users: Arc<dyn UserStore>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "AUTHENTICATION_TOKEN_MISSING",
            "Authentication token missing",
        )
    })?;

    let claims = state.signer.verify(token, Utc::now()).map_err(|_| wrong_token())?;

    // The token subject must still resolve to a live user.
    let user = state
        .users
        .find_by_id(claims.sub)
        .ok()
        .flatten()
        .ok_or_else(wrong_token)?;

    req.extensions_mut().insert(AuthContext::new(user.id));

    Ok(next.run(req).await)
}

fn wrong_token() -> Response {
    errors::json_error(
        StatusCode::UNAUTHORIZED,
        "WRONG_AUTHENTICATION_TOKEN",
        "Wrong authentication token",
    )
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();

    if token.is_empty() { None } else { Some(token) }
}
