//! Server render pass and the sample resource API.
//!
//! Flow Overview:
//! - `GET /` resolves the session credential, opens a render cycle,
//!   materializes the identity and seals the cycle into the page.
//! - `/v1/*` is the resource API. It authorizes every call with the session
//!   credential and never trusts the handoff snapshot.
//! - `GET /v1/handoff/key` publishes the key that verifies sealed snapshots.

pub mod handlers;
mod materializer;
mod openapi;
pub mod session;

pub use materializer::{Materialization, ServerMaterializer};
pub use openapi::openapi;
pub use session::{MemorySessionStore, SessionStore, SESSION_COOKIE_NAME};

use crate::channel::{HandoffChannel, SnapshotSchema, SnapshotSigner};
use crate::identity::PolicyRegistry;
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    schema: SnapshotSchema,
    policies: PolicyRegistry,
    signer: SnapshotSigner,
    secure_cookies: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SnapshotSchema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: SnapshotSigner) -> Self {
        self.signer = signer;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &SnapshotSchema {
        &self.schema
    }

    #[must_use]
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    #[must_use]
    pub fn signer(&self) -> &SnapshotSigner {
        &self.signer
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

/// State shared by every request handler.
pub struct AppState {
    config: ServerConfig,
    channel: Arc<HandoffChannel>,
    sessions: Arc<dyn SessionStore>,
    materializer: ServerMaterializer,
}

impl AppState {
    pub fn new(config: ServerConfig, sessions: Arc<dyn SessionStore>) -> Self {
        let materializer = ServerMaterializer::new(config.schema().clone());
        Self {
            config,
            channel: HandoffChannel::new(),
            sessions,
            materializer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<HandoffChannel> {
        &self.channel
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn materializer(&self) -> &ServerMaterializer {
        &self.materializer
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::render::render))
        .route("/health", get(handlers::health::health))
        .route("/v1/me", get(handlers::me::get_me))
        .route("/v1/authorize/:policy", get(handlers::me::authorize))
        .route("/v1/auth/logout", post(handlers::logout::logout))
        .route("/v1/handoff/key", get(handlers::handoff_key::handoff_key))
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
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, config: ServerConfig, sessions: Arc<dyn SessionStore>) -> Result<()> {
    let state = Arc::new(AppState::new(config, sessions));
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
