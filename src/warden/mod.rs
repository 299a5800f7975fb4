//! HTTP surface: routes, layers and server startup.

pub mod handlers;
pub mod security;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::{
    auth::{require_session, AuthConfig, AuthManager, ServerSecret},
    email::Mailer,
    store::{memory::MemoryUserStore, postgres::PgUserStore, UserRepository},
};
use handlers::{auth, health, users};
use security::AllowedHosts;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Build the application router over `manager`.
pub fn router<S: UserRepository>(manager: Arc<AuthManager<S>>, allowed_hosts: AllowedHosts) -> Router {
    let session = middleware::from_fn_with_state(manager.clone(), require_session::<S>);

    Router::new()
        .route("/health", get(health::health::<S>))
        .route(
            "/auth",
            post(auth::login::<S>).merge(delete(auth::logout::<S>).route_layer(session.clone())),
        )
        .route("/auth/me", get(auth::me).route_layer(session.clone()))
        .route(
            "/auth/request_password_reset",
            post(auth::request_password_reset::<S>),
        )
        .route("/auth/reset_password", post(auth::reset_password::<S>))
        .route(
            "/auth/change_password",
            post(auth::change_password::<S>).route_layer(session.clone()),
        )
        .route(
            "/user",
            post(users::create::<S>).merge(get(users::list::<S>).route_layer(session.clone())),
        )
        .route("/user/:user_id", get(users::get::<S>).route_layer(session))
        .with_state(manager)
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
                .layer(middleware::from_fn(security::policy_headers))
                .layer(middleware::from_fn_with_state(
                    Arc::new(allowed_hosts),
                    security::allowed_hosts,
                )),
        )
}

/// Start the server
/// # Errors
/// Return error if the store cannot be reached or the listener fails
pub async fn new(
    port: u16,
    dsn: Option<String>,
    secret: ServerSecret,
    config: AuthConfig,
    allowed_hosts: AllowedHosts,
    mailer: Arc<dyn Mailer>,
) -> Result<()> {
    if let Some(dsn) = dsn {
        let store = PgUserStore::connect(&dsn).await?;
        store.migrate().await?;
        let manager = AuthManager::new(store, mailer, secret, config);
        serve(port, router(Arc::new(manager), allowed_hosts)).await
    } else {
        info!("No database configured, accounts are kept in memory");
        let manager = AuthManager::new(MemoryUserStore::new(), mailer, secret, config);
        serve(port, router(Arc::new(manager), allowed_hosts)).await
    }
}

async fn serve(port: u16, app: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
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
