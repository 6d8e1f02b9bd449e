use crate::{
    api::handlers::{health, login, root, users},
    auth::Authenticator,
    directory::DirectoryService,
    session::{self, SessionStore},
    users::CredentialStore,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::{ApiDoc, openapi};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Web routes with session handling, without the outer request-id/trace layers.
#[must_use]
pub fn router(store: Arc<dyn CredentialStore>, sessions: Arc<SessionStore>) -> Router {
    let authenticator = Authenticator::new(store.clone());
    let directory = DirectoryService::new(store.clone());

    let user_routes = Router::new()
        .route("/list", get(users::list))
        .route("/add", get(users::add_page).post(users::add))
        .route("/view/:id", get(users::view))
        .route("/edit/:id", get(users::edit_page).post(users::edit))
        .route("/delete/:id", get(users::delete))
        .route_layer(from_fn(session::require_login));

    Router::new()
        .route("/", get(root::index))
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(login::logout))
        .nest("/users", user_routes)
        .layer(from_fn_with_state(sessions, session::persist_session))
        .route("/health", get(health::health))
        .layer(Extension(authenticator))
        .layer(Extension(directory))
        .layer(Extension(store))
}

/// Serve the web transport until a shutdown signal arrives on `shutdown`
/// or the process receives Ctrl-C.
/// # Errors
/// Return error if the listener cannot be bound or the server fails
pub async fn new(
    addr: SocketAddr,
    store: Arc<dyn CredentialStore>,
    sessions: Arc<SessionStore>,
    mut shutdown: UnboundedReceiver<()>,
) -> Result<()> {
    // Sweep at a quarter of the TTL.
    let reap_every = (sessions.ttl() / 4).max(Duration::from_secs(1));
    let reaper = session::spawn_reaper(sessions.clone(), reap_every);

    let app = router(store, sessions).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            info!("Gracefully shutdown");
        })
        .await?;

    reaper.abort();

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
