use axum::Router;

pub mod auth;
pub mod jobs;
pub mod projects;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/projects", projects::router())
}
