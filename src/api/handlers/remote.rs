//! Remote endpoints for the gitmini CLI: connecting a working copy and
//! pushing commits.
//!
//! Both endpoints authenticate with an API key, never a password, so
//! failures here do not feed the login rate limiter. Push reports denied
//! and missing repositories with one shared message; `remote add` tells
//! them apart.

use axum::{
    Extension, Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, instrument};
use utoipa::ToSchema;

use crate::{
    auth::keys::verify_api_key,
    repos::{RefUpdateError, RepoStore},
    users::{UserStore, Users},
};

#[derive(Deserialize, ToSchema)]
pub struct RemoteAddRequest {
    pub user: String,
    pub api_key: String,
    pub repo: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PushRequest {
    pub user: String,
    pub api_key: String,
    pub repo: String,
    pub branch: String,
    /// Commit id the branch tip should point at after the push.
    pub commit: String,
    /// Tip the client last saw; required once the branch has commits.
    #[serde(default)]
    pub expected_remote_commit: Option<String>,
    /// Object id → payload, stored verbatim before the ref moves.
    #[serde(default)]
    pub objects: BTreeMap<String, String>,
}

/// Error envelope shared by the remote endpoints.
#[derive(Serialize, ToSchema)]
pub struct ApiMessage {
    pub status: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct RemoteAddResponse {
    pub status: String,
    pub message: String,
    pub branches: BTreeMap<String, String>,
}

#[derive(Serialize, ToSchema)]
pub struct PushResponse {
    pub status: String,
    pub message: String,
    pub commit: String,
}

#[derive(Serialize, ToSchema)]
pub struct PushConflict {
    pub status: String,
    pub message: String,
    /// Where the branch actually is, so the client can rebase and retry.
    pub most_recent_remote_branch_commit: Option<String>,
}

/// Connect a working copy to a hosted repository and report its branches.
#[utoipa::path(
    post,
    path = "/api/remote/add",
    tag = "minihub",
    request_body = RemoteAddRequest,
    responses(
        (status = 200, description = "Connected to remote", body = RemoteAddResponse),
        (status = 401, description = "Authentication failed", body = ApiMessage),
        (status = 403, description = "Repository belongs to another user", body = ApiMessage),
        (status = 404, description = "Repository not found", body = ApiMessage),
    )
)]
#[instrument(skip_all, fields(repo = %payload.repo))]
pub async fn add(
    Extension(store): Extension<Arc<dyn UserStore>>,
    Extension(repos): Extension<Arc<RepoStore>>,
    Json(payload): Json<RemoteAddRequest>,
) -> Response {
    let users = match store.load_all() {
        Ok(users) => users,
        Err(err) => return internal_error(err),
    };

    if !authenticate(&users, &payload.user, &payload.api_key) {
        return message(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    match resolve_repo(&repos, &users, &payload.user, &payload.repo) {
        RepoAccess::Owned => {}
        RepoAccess::OwnedElsewhere => {
            return message(StatusCode::FORBIDDEN, "Access denied to repository");
        }
        RepoAccess::Missing => {
            return message(StatusCode::NOT_FOUND, "Repository not found");
        }
    }

    match repos.list_branches(&payload.user, &payload.repo) {
        Ok(branches) => (
            StatusCode::OK,
            Json(RemoteAddResponse {
                status: "ok".to_string(),
                message: "Connected to remote".to_string(),
                branches,
            }),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

/// Admit a push: authenticate, resolve the repository, store the objects
/// and fast-forward the branch tip.
#[utoipa::path(
    post,
    path = "/api/remote/push",
    tag = "minihub",
    request_body = PushRequest,
    responses(
        (status = 200, description = "Push successful", body = PushResponse),
        (status = 401, description = "Authentication failed", body = ApiMessage),
        (status = 403, description = "Repository belongs to another user", body = ApiMessage),
        (status = 404, description = "Repository or branch not found", body = ApiMessage),
        (status = 409, description = "Non-fast-forward push", body = PushConflict),
    )
)]
#[instrument(skip_all, fields(repo = %payload.repo, branch = %payload.branch))]
pub async fn push(
    Extension(store): Extension<Arc<dyn UserStore>>,
    Extension(repos): Extension<Arc<RepoStore>>,
    Json(payload): Json<PushRequest>,
) -> Response {
    let users = match store.load_all() {
        Ok(users) => users,
        Err(err) => return internal_error(err),
    };

    if !authenticate(&users, &payload.user, &payload.api_key) {
        return message(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    match resolve_repo(&repos, &users, &payload.user, &payload.repo) {
        RepoAccess::Owned => {}
        RepoAccess::OwnedElsewhere => {
            return message(StatusCode::FORBIDDEN, "Repository not found or access denied");
        }
        RepoAccess::Missing => {
            return message(StatusCode::NOT_FOUND, "Repository not found or access denied");
        }
    }

    if let Err(err) = repos.store_objects(&payload.user, &payload.repo, &payload.objects) {
        return internal_error(err);
    }

    match repos
        .update_branch(
            &payload.user,
            &payload.repo,
            &payload.branch,
            &payload.commit,
            payload.expected_remote_commit.as_deref(),
        )
        .await
    {
        Ok(commit) => (
            StatusCode::OK,
            Json(PushResponse {
                status: "ok".to_string(),
                message: "Push successful".to_string(),
                commit,
            }),
        )
            .into_response(),
        Err(RefUpdateError::BranchNotFound) => {
            message(StatusCode::NOT_FOUND, "Remote branch not found.")
        }
        Err(RefUpdateError::NonFastForward { current_tip }) => (
            StatusCode::CONFLICT,
            Json(PushConflict {
                status: "error".to_string(),
                message: "Push rejected: non-fast-forward".to_string(),
                most_recent_remote_branch_commit: current_tip,
            }),
        )
            .into_response(),
        Err(err @ RefUpdateError::Io(_)) => internal_error(err),
    }
}

enum RepoAccess {
    Owned,
    OwnedElsewhere,
    Missing,
}

fn authenticate(users: &Users, username: &str, api_key: &str) -> bool {
    match users.get(username) {
        Some(record) => verify_api_key(api_key, &record.api_keys),
        None => verify_api_key(api_key, &[]),
    }
}

fn resolve_repo(repos: &RepoStore, users: &Users, username: &str, repo: &str) -> RepoAccess {
    if repos.repo_exists(username, repo) {
        return RepoAccess::Owned;
    }

    let others = users
        .keys()
        .map(String::as_str)
        .filter(|name| *name != username);
    if repos.owner_among(others, repo).is_some() {
        return RepoAccess::OwnedElsewhere;
    }
    RepoAccess::Missing
}

fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(ApiMessage {
            status: "error".to_string(),
            message: text.to_string(),
        }),
    )
        .into_response()
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    error!("{err}");
    message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
