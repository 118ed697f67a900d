//! CLI login handshake: init, verify and status.
//!
//! Flow Overview:
//! 1) The CLI calls `POST /auth/init` and shows the returned `login_url`.
//! 2) The browser page behind that URL submits `POST /auth/verify` with the
//!    user's credentials; on success a fresh API key is minted, its digest
//!    persisted, and the session completed.
//! 3) The CLI polls `GET /auth/status` until the key is ready. The raw key
//!    is returned exactly once; the session is gone afterwards.
//!
//! Failed verifications are rate limited per client origin before any token
//! or credential check runs.

use axum::{
    Extension,
    extract::{ConnectInfo, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::Json,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, error, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::handlers::client_origin,
    auth::{
        keys::{generate_api_key, hash_api_key},
        password::verify_password,
        sessions::SessionError,
        state::AuthState,
    },
    users::{UserStore, normalize_username},
};

/// Error body, mirrors the `detail` field CLI clients already parse.
#[derive(Serialize, ToSchema)]
pub struct Detail {
    detail: String,
}

#[derive(Serialize, ToSchema)]
pub struct InitResponse {
    pub cli_token: String,
    pub login_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub cli_token: String,
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct VerifyResponse {
    pub message: String,
}

#[derive(Deserialize, IntoParams)]
pub struct StatusArgs {
    /// Session token handed out by `/auth/init`.
    pub cli_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub username: String,
    pub api_key: String,
}

type Rejection = (StatusCode, Json<Detail>);
type InitResult = Result<Json<InitResponse>, Rejection>;
type VerifyResult = Result<Json<VerifyResponse>, Rejection>;
type StatusResult = Result<(HeaderMap, Json<StatusResponse>), Rejection>;

/// Start a CLI login session.
#[utoipa::path(
    post,
    path = "/auth/init",
    tag = "minihub",
    responses(
        (status = 200, description = "Session created", body = InitResponse),
        (status = 429, description = "Too many active sessions", body = Detail),
    )
)]
#[instrument(skip(state))]
pub async fn init(Extension(state): Extension<Arc<AuthState>>) -> InitResult {
    let session = state
        .sessions()
        .create()
        .await
        .map_err(|err| detail(StatusCode::TOO_MANY_REQUESTS, &err.to_string()))?;

    debug!(expires_at = %session.expires_at, "cli login session created");

    let login_url = build_login_url(state.config().base_url(), &session.cli_token);
    Ok(Json(InitResponse {
        cli_token: session.cli_token,
        login_url,
    }))
}

/// Verify the user's identity for a pending session and mint an API key.
#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "minihub",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Authentication successful", body = VerifyResponse),
        (status = 400, description = "Invalid or expired CLI token", body = Detail),
        (status = 401, description = "Invalid credentials", body = Detail),
        (status = 429, description = "Too many failed attempts", body = Detail),
    )
)]
#[instrument(skip_all)]
pub async fn verify(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(store): Extension<Arc<dyn UserStore>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<VerifyRequest>,
) -> VerifyResult {
    let origin = client_origin(&headers, peer.map(|info| info.0));

    if state.limiter().is_blocked(&origin).await {
        return Err(detail(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many failed attempts",
        ));
    }

    if let Err(err) = state.sessions().validate(&payload.cli_token).await {
        state.limiter().record_failure(&origin).await;
        warn!(%origin, "cli token rejected: {err}");
        return Err(detail(StatusCode::BAD_REQUEST, &err.to_string()));
    }

    let username = normalize_username(&payload.username);

    // Key issuance is a read-modify-write on the snapshot store.
    let _write = state.store_write().lock().await;

    let Some(mut record) = store.get(&username).map_err(internal_error)? else {
        state.limiter().record_failure(&origin).await;
        return Err(detail(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    };
    if !verify_password(&payload.password, &record.password_hash) {
        state.limiter().record_failure(&origin).await;
        return Err(detail(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let api_key = generate_api_key().map_err(internal_error)?;
    record.api_keys.push(hash_api_key(api_key.expose_secret()));
    store.put(&username, record).map_err(internal_error)?;

    // The digest is persisted before the session carries the raw key; if
    // the session raced to expiry the key is simply never revealed.
    match state
        .sessions()
        .complete(&payload.cli_token, username, api_key)
        .await
    {
        Ok(()) => Ok(Json(VerifyResponse {
            message: "Authentication successful".to_string(),
        })),
        Err(err) => Err(detail(StatusCode::BAD_REQUEST, &err.to_string())),
    }
}

/// Poll a session for its credentials.
#[utoipa::path(
    get,
    path = "/auth/status",
    tag = "minihub",
    params(StatusArgs),
    responses(
        (status = 200, description = "Credentials, revealed once", body = StatusResponse),
        (status = 400, description = "Invalid or expired CLI token", body = Detail),
        (status = 401, description = "Authentication not completed", body = Detail),
    )
)]
#[instrument(skip_all)]
pub async fn status(
    Extension(state): Extension<Arc<AuthState>>,
    Query(args): Query<StatusArgs>,
) -> StatusResult {
    match state.sessions().consume_if_complete(&args.cli_token).await {
        Ok(completed) => {
            let mut headers = HeaderMap::new();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            Ok((
                headers,
                Json(StatusResponse {
                    username: completed.username,
                    api_key: completed.api_key.expose_secret().to_string(),
                }),
            ))
        }
        Err(SessionError::NotReady) => Err(detail(
            StatusCode::UNAUTHORIZED,
            "Authentication not completed",
        )),
        Err(err) => Err(detail(StatusCode::BAD_REQUEST, &err.to_string())),
    }
}

fn build_login_url(base_url: &str, cli_token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/cli-login?cli_token={cli_token}")
}

fn detail(status: StatusCode, message: &str) -> Rejection {
    (
        status,
        Json(Detail {
            detail: message.to_string(),
        }),
    )
}

fn internal_error(err: impl std::fmt::Display) -> Rejection {
    error!("{err}");
    detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_is_anchored_at_the_base() {
        assert_eq!(
            build_login_url("http://localhost:8080", "t1"),
            "http://localhost:8080/cli-login?cli_token=t1"
        );
        assert_eq!(
            build_login_url("https://hub.example.com/", "t1"),
            "https://hub.example.com/cli-login?cli_token=t1"
        );
    }

    #[test]
    fn detail_carries_the_message() {
        let (status, Json(body)) = detail(StatusCode::BAD_REQUEST, "Invalid CLI token");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.detail, "Invalid CLI token");
    }
}
