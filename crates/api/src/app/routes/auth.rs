//! Signup, OTP verification, and login.

use std::sync::Arc;

use axum::{Json, Router, extract::Extension, http::StatusCode, routing::post};
use chrono::Utc;

use jobhub_onboarding::ChallengeId;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify", post(verify))
        .route("/login", post(login))
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignupRequest>,
) -> axum::response::Response {
    match services
        .onboarding
        .signup(&body.email, &body.password, &body.name, Utc::now())
    {
        Ok(out) => {
            let message = if out.resent { "OTP resent" } else { "OTP sent" };
            errors::json_success(StatusCode::OK, message, dto::signup_to_json(&out))
        }
        Err(e) => errors::onboarding_error_to_response(e),
    }
}

pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::VerifyOtpRequest>,
) -> axum::response::Response {
    let challenge_id: ChallengeId = match body.request_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "invalid challenge id",
            );
        }
    };

    match services
        .onboarding
        .confirm_signup(challenge_id, &body.code, Utc::now())
    {
        Ok(token) => errors::json_success(
            StatusCode::OK,
            "User verified",
            serde_json::json!({ "token": token }),
        ),
        Err(e) => errors::onboarding_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    match services
        .onboarding
        .login(&body.email, &body.password, Utc::now())
    {
        Ok(token) => errors::json_success(
            StatusCode::OK,
            "Logged in",
            serde_json::json!({ "token": token }),
        ),
        Err(e) => errors::onboarding_error_to_response(e),
    }
}
