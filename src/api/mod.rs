//! HTTP surface: router, middleware stack, OpenAPI document and the serve
//! loop with graceful shutdown.

#[allow(unused_imports)]
use crate::{
    api::handlers::{
        cli_auth, cli_auth::__path_init, cli_auth::__path_status, cli_auth::__path_verify, health,
        health::__path_health, remote, remote::__path_add, remote::__path_push,
    },
    auth::state::AuthState,
    repos::RepoStore,
    users::UserStore,
};
use anyhow::Result;
use axum::{
    Extension, Json, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, debug_span, info};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[derive(OpenApi)]
#[openapi(
    paths(health, init, verify, status, add, push),
    components(schemas(
        health::Health,
        cli_auth::Detail,
        cli_auth::InitResponse,
        cli_auth::VerifyRequest,
        cli_auth::VerifyResponse,
        cli_auth::StatusResponse,
        remote::ApiMessage,
        remote::RemoteAddRequest,
        remote::RemoteAddResponse,
        remote::PushRequest,
        remote::PushResponse,
        remote::PushConflict
    )),
    tags(
        (name = "minihub", description = "gitmini remote hub API"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Assemble the application router.
///
/// `/health` and the OpenAPI document sit outside the traced middleware
/// stack so probes do not pollute the request spans.
#[must_use]
pub fn router(auth: Arc<AuthState>, users: Arc<dyn UserStore>, repos: Arc<RepoStore>) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .route("/auth/init", post(cli_auth::init))
        .route("/auth/verify", post(cli_auth::verify))
        .route("/auth/status", get(cli_auth::status))
        .route("/api/remote/add", post(remote::add))
        .route("/api/remote/push", post(remote::push))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth))
                .layer(Extension(users))
                .layer(Extension(repos)),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/api-docs/openapi.json", get(|| async { Json(openapi()) }))
}

/// Bind and serve until ctrl-c.
/// # Errors
/// Returns an error if the listener cannot bind or the server fails
pub async fn new(
    port: u16,
    auth: Arc<AuthState>,
    users: Arc<dyn UserStore>,
    repos: Arc<RepoStore>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });

    let app = router(auth, users, repos);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    // ConnectInfo feeds the client origin fallback in the verify handler.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        rx.recv().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
