//! Idempotent job submission and status lookup.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use chrono::Utc;

use jobhub_jobs::{JobId, SubmitOutcome};

use crate::app::{dto, errors, services::AppServices};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/execute", post(execute_job))
        .route("/:id", get(get_job_status))
}

/// POST /v1/jobs/execute — idempotent job creation.
///
/// The idempotency key travels as the `Idempotency-Key` request header.
pub async fn execute_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Json(body): Json<dto::ExecuteJobRequest>,
) -> axum::response::Response {
    let Some(key) = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
    else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "Idempotency-Key header missing",
        );
    };

    match services
        .jobs
        .submit(auth.user_id(), key, body.payload, Utc::now())
    {
        Ok(SubmitOutcome::Created(job)) => {
            errors::json_success(StatusCode::ACCEPTED, "Job queued", dto::job_to_json(&job))
        }
        Ok(SubmitOutcome::Replayed(job)) => errors::json_success(
            StatusCode::OK,
            "Job already exists",
            dto::job_to_json(&job),
        ),
        Err(e) => errors::job_error_to_response(e),
    }
}

/// GET /v1/jobs/:id — status lookup with ownership enforcement.
pub async fn get_job_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "invalid job id");
        }
    };

    match services.jobs.get_status(auth.user_id(), job_id) {
        Ok(job) => errors::json_success(StatusCode::OK, "Job status", dto::job_to_json(&job)),
        Err(e) => errors::job_error_to_response(e),
    }
}
