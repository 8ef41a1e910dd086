//! Uniform response envelope and exhaustive error mapping.
//!
//! Every response carries `{status, message, data}`; failures additionally
//! carry a machine-readable `code`. Each domain error variant maps to exactly
//! one HTTP status + code pair, and no internal detail beyond that crosses
//! the boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use jobhub_jobs::JobError;
use jobhub_onboarding::OnboardingError;
use jobhub_projects::ProjectStoreError;

/// Success envelope.
pub fn json_success(
    status: StatusCode,
    message: impl Into<String>,
    data: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "status": true,
            "message": message.into(),
            "data": data,
        })),
    )
        .into_response()
}

/// Failure envelope with a machine-readable code.
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with_data(status, code, message, serde_json::Value::Null)
}

pub fn json_error_with_data(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    data: serde_json::Value,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "status": false,
            "message": message.into(),
            "code": code,
            "data": data,
        })),
    )
        .into_response()
}

pub fn onboarding_error_to_response(err: OnboardingError) -> axum::response::Response {
    match err {
        OnboardingError::Validation(fields) => json_error_with_data(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "validation failed",
            json!(fields),
        ),
        OnboardingError::RateLimited { retry_after_secs } => json_error_with_data(
            StatusCode::TOO_MANY_REQUESTS,
            "TOO_MANY_OTP_REQUESTS",
            "Too many OTP requests. Try again later.",
            json!({ "retryAfterSecs": retry_after_secs }),
        ),
        OnboardingError::InvalidOrExpiredCode => json_error(
            StatusCode::BAD_REQUEST,
            "INVALID_OR_EXPIRED_OTP",
            "Invalid or expired OTP",
        ),
        OnboardingError::EmailInUse => json_error(
            StatusCode::UNAUTHORIZED,
            "OCCUPIED_EMAIL",
            "Email already exists",
        ),
        OnboardingError::WrongCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "INVALID_CRED",
            "Invalid email or password",
        ),
        OnboardingError::Delivery(_) => json_error(
            StatusCode::BAD_GATEWAY,
            "EMAIL_DELIVERY_FAILED",
            "Failed to send OTP email",
        ),
        OnboardingError::Auth(_) | OnboardingError::Store(_) => internal_error(),
    }
}

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        JobError::NotFound => json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Job not found"),
        JobError::Forbidden => json_error(StatusCode::FORBIDDEN, "FORBIDDEN", "Access denied"),
        JobError::Queue(_) | JobError::Store(_) => internal_error(),
    }
}

pub fn project_store_error_to_response(err: ProjectStoreError) -> axum::response::Response {
    match err {
        ProjectStoreError::NotFound => {
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Project not found")
        }
        ProjectStoreError::Storage(_) => internal_error(),
    }
}

pub fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_SERVER_ERROR",
        "Internal server error",
    )
}
