//! Project CRUD with owner-only mutation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use jobhub_core::UserId;
use jobhub_projects::{Project, ProjectId, ProjectStore};

use crate::app::{dto, errors, services::AppServices};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_project))
        .route("/:id", get(get_project).patch(update_project))
        .route("/:id/invite", post(invite_member))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<dto::CreateProjectRequest>,
) -> axum::response::Response {
    if body.name.trim().chars().count() < 3 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "name must be at least 3 characters",
        );
    }

    let project = Project::new(
        body.name.trim().to_string(),
        body.description,
        auth.user_id(),
        Utc::now(),
    );

    match services.projects.create(project.clone()) {
        Ok(()) => errors::json_success(
            StatusCode::CREATED,
            "Project created",
            dto::project_to_json(&project),
        ),
        Err(e) => errors::project_store_error_to_response(e),
    }
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let project = match load_project(&services, &id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if !project.has_access(auth.user_id()) {
        return errors::json_error(StatusCode::FORBIDDEN, "FORBIDDEN", "Access denied");
    }

    errors::json_success(
        StatusCode::OK,
        "Project fetched",
        dto::project_to_json(&project),
    )
}

pub async fn update_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProjectRequest>,
) -> axum::response::Response {
    let mut project = match load_project(&services, &id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if project.owner != auth.user_id() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Only owner can update project",
        );
    }

    if let Some(name) = body.name {
        project.name = name;
    }
    if let Some(description) = body.description {
        project.description = Some(description);
    }
    if let Some(is_archived) = body.is_archived {
        project.is_archived = is_archived;
    }

    match services.projects.update(project.clone()) {
        Ok(()) => errors::json_success(
            StatusCode::OK,
            "Project updated",
            dto::project_to_json(&project),
        ),
        Err(e) => errors::project_store_error_to_response(e),
    }
}

pub async fn invite_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InviteMemberRequest>,
) -> axum::response::Response {
    let mut project = match load_project(&services, &id) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if project.owner != auth.user_id() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Only owner can invite members",
        );
    }

    let user: UserId = match body.user_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "invalid user id");
        }
    };

    if let Err(e) = project.invite(user, body.role, Utc::now()) {
        return errors::json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string());
    }

    match services.projects.update(project.clone()) {
        Ok(()) => errors::json_success(
            StatusCode::OK,
            "Member invited",
            dto::project_to_json(&project),
        ),
        Err(e) => errors::project_store_error_to_response(e),
    }
}

fn load_project(
    services: &AppServices,
    raw_id: &str,
) -> Result<Project, axum::response::Response> {
    let id: ProjectId = raw_id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "invalid project id")
    })?;

    match services.projects.find_by_id(id) {
        Ok(Some(project)) => Ok(project),
        Ok(None) => Err(errors::json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Project not found",
        )),
        Err(e) => Err(errors::project_store_error_to_response(e)),
    }
}
