//! HTTP application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: dependency wiring (stores, engines, executor pool)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: the uniform response envelope and error mapping

use std::sync::Arc;

use axum::{Extension, Router, http::StatusCode, routing::get};
use tower::ServiceBuilder;

use jobhub_auth::TokenSigner;
use jobhub_onboarding::UserStore;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        signer: services.signer.clone() as Arc<dyn TokenSigner>,
        users: services.users.clone() as Arc<dyn UserStore>,
    };

    // Public routes: signup/verify/login.
    let public = routes::auth::router().layer(Extension(services.clone()));

    // Protected routes: require a valid session token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let v1 = Router::new().nest("/auth", public).merge(protected);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", v1)
        .fallback(unknown_endpoint)
        .layer(ServiceBuilder::new())
}

async fn unknown_endpoint() -> axum::response::Response {
    errors::json_error(
        StatusCode::NOT_FOUND,
        "API_ENDPOINT_NOT_FOUND",
        "We are unable to locate the requested API resource",
    )
}
