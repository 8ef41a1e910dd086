//! Request DTOs and JSON mapping helpers.
//!
//! The wire format is camelCase; mapping is explicit rather than derived so
//! the HTTP surface can evolve independently of the domain types.

use serde::Deserialize;
use serde_json::json;

use jobhub_jobs::JobRecord;
use jobhub_onboarding::SignupOutcome;
use jobhub_projects::{Project, ProjectRole};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub request_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteJobRequest {
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMemberRequest {
    pub user_id: String,
    pub role: ProjectRole,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn signup_to_json(out: &SignupOutcome) -> serde_json::Value {
    json!({
        "userId": out.user_id.to_string(),
        "challengeId": out.challenge_id.to_string(),
        "expiresAt": out.expires_at.to_rfc3339(),
    })
}

pub fn job_to_json(job: &JobRecord) -> serde_json::Value {
    json!({
        "id": job.id.to_string(),
        "userId": job.user_id.to_string(),
        "idempotencyKey": job.idempotency_key,
        "status": job.status,
        "input": job.input,
        "result": job.result,
        "error": job.error,
        "createdAt": job.created_at.to_rfc3339(),
        "updatedAt": job.updated_at.to_rfc3339(),
    })
}

pub fn project_to_json(project: &Project) -> serde_json::Value {
    json!({
        "id": project.id.to_string(),
        "name": project.name,
        "description": project.description,
        "owner": project.owner.to_string(),
        "members": project.members.iter().map(|m| json!({
            "user": m.user.to_string(),
            "role": m.role,
            "invitedAt": m.invited_at.to_rfc3339(),
        })).collect::<Vec<_>>(),
        "isArchived": project.is_archived,
        "createdAt": project.created_at.to_rfc3339(),
    })
}
