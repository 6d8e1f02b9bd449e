use axum::{
    extract::{Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

use super::{FormEcho, SessionData, SessionIdentity, SessionStore, cookie};

#[derive(Default)]
struct Inner {
    data: SessionData,
    rotate: bool,
}

/// Per-request handle to the caller's session, placed in request extensions.
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                rotate: false,
            })),
        }
    }

    pub async fn identity(&self) -> Option<SessionIdentity> {
        self.inner.lock().await.data.identity().cloned()
    }

    /// Bind the session to `identity`. The session token is replaced on save.
    pub async fn login(&self, identity: SessionIdentity) {
        let mut inner = self.inner.lock().await;
        inner.data.login(identity);
        inner.rotate = true;
    }

    pub async fn logout(&self) {
        self.inner.lock().await.data.logout();
    }

    pub async fn flash(&self, message: impl Into<String>) {
        self.inner.lock().await.data.flash(message);
    }

    pub async fn take_flashes(&self) -> Vec<String> {
        self.inner.lock().await.data.take_flashes()
    }

    pub async fn echo_form(&self, form: FormEcho) {
        self.inner.lock().await.data.echo_form(form);
    }

    pub async fn take_form(&self) -> Option<FormEcho> {
        self.inner.lock().await.data.take_form()
    }

    async fn finish(&self) -> (SessionData, bool) {
        let inner = self.inner.lock().await;
        (inner.data.clone(), inner.rotate)
    }
}

/// Load the session before the handler and persist it exactly once afterwards,
/// whatever the handler returned.
pub async fn persist_session(
    State(store): State<Arc<SessionStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = cookie::extract_session_token(request.headers());
    let mut live_token = None;
    let mut data = SessionData::default();
    if let Some(token) = presented {
        if let Some(loaded) = store.load(&token).await {
            data = loaded;
            live_token = Some(token);
        }
    }

    let session = Session::new(data);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let (data, rotate) = session.finish().await;

    if data.is_empty() {
        if let Some(token) = live_token {
            store.remove(&token).await;
            if let Ok(cleared) = cookie::clear_session_cookie(store.cookie_secure()) {
                response.headers_mut().append(SET_COOKIE, cleared);
            }
        }
        return response;
    }

    let token = match live_token {
        Some(token) if !rotate => token,
        previous => {
            if let Some(token) = previous {
                store.remove(&token).await;
            }
            match cookie::generate_session_token() {
                Ok(token) => token,
                Err(err) => {
                    error!("Failed to generate session token: {err:#}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }
    };

    store.save(&token, data).await;

    match cookie::session_cookie(&token, store.ttl().as_secs(), store.cookie_secure()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
            response
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Redirect anonymous clients to `/login`.
pub async fn require_login(request: Request, next: Next) -> Response {
    let session = request.extensions().get::<Session>().cloned();
    let authenticated = match session {
        Some(session) => session.identity().await.is_some(),
        None => false,
    };
    if authenticated {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Extension, Router,
        body::Body,
        http::{HeaderValue, Request as HttpRequest, header::COOKIE},
        middleware::{from_fn, from_fn_with_state},
        routing::get,
    };
    use crate::session::DEFAULT_SESSION_TTL;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app(store: Arc<SessionStore>) -> Router {
        Router::new()
            .route(
                "/login",
                get(|Extension(session): Extension<Session>| async move {
                    session
                        .login(SessionIdentity {
                            id: Uuid::nil(),
                            username: "sa".to_string(),
                        })
                        .await;
                    StatusCode::OK
                }),
            )
            .route(
                "/flash-then-fail",
                get(|Extension(session): Extension<Session>| async move {
                    session.flash("bad input").await;
                    StatusCode::BAD_REQUEST
                }),
            )
            .route(
                "/logout",
                get(|Extension(session): Extension<Session>| async move {
                    session.logout().await;
                    StatusCode::OK
                }),
            )
            .route(
                "/private",
                get(|Extension(session): Extension<Session>| async move {
                    session.take_flashes().await;
                    StatusCode::OK
                })
                .route_layer(from_fn(require_login)),
            )
            .route("/noop", get(|| async { StatusCode::OK }))
            .layer(from_fn_with_state(store, persist_session))
    }

    fn session_token(response: &Response) -> Option<String> {
        let value = response.headers().get(SET_COOKIE)?.to_str().ok()?;
        let pair = value.split(';').next()?;
        let (_, token) = pair.split_once('=')?;
        (!token.is_empty()).then(|| token.to_string())
    }

    fn get_with(uri: &str, token: Option<&str>) -> anyhow::Result<HttpRequest<Body>> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(COOKIE, HeaderValue::from_str(&format!("ttb-auth={token}"))?);
        }
        Ok(builder.body(Body::empty())?)
    }

    #[tokio::test]
    async fn anonymous_request_without_changes_sets_no_cookie() -> anyhow::Result<()> {
        let store = Arc::new(SessionStore::new(DEFAULT_SESSION_TTL, false));
        let response = app(store.clone()).oneshot(get_with("/noop", None)?).await?;
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn session_is_saved_on_error_responses() -> anyhow::Result<()> {
        let store = Arc::new(SessionStore::new(DEFAULT_SESSION_TTL, false));
        let response = app(store.clone())
            .oneshot(get_with("/flash-then-fail", None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let token = session_token(&response).ok_or_else(|| anyhow::anyhow!("no cookie"))?;
        let mut data = store
            .load(&token)
            .await
            .ok_or_else(|| anyhow::anyhow!("session not saved"))?;
        assert_eq!(data.take_flashes(), vec!["bad input"]);
        Ok(())
    }

    #[tokio::test]
    async fn login_rotates_token_and_gates_private_routes() -> anyhow::Result<()> {
        let store = Arc::new(SessionStore::new(DEFAULT_SESSION_TTL, false));
        let app = app(store.clone());

        let response = app.clone().oneshot(get_with("/private", None)?).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").map(|v| v.as_bytes()), Some(&b"/login"[..]));

        let response = app.clone().oneshot(get_with("/flash-then-fail", None)?).await?;
        let anonymous = session_token(&response).ok_or_else(|| anyhow::anyhow!("no cookie"))?;

        let response = app.clone().oneshot(get_with("/login", Some(&anonymous))?).await?;
        let authenticated = session_token(&response).ok_or_else(|| anyhow::anyhow!("no cookie"))?;
        assert_ne!(anonymous, authenticated);
        assert!(store.load(&anonymous).await.is_none());

        let response = app
            .clone()
            .oneshot(get_with("/private", Some(&authenticated))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_with("/logout", Some(&authenticated))?).await?;
        assert!(
            response
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("Max-Age=0"))
        );
        assert!(store.load(&authenticated).await.is_none());
        Ok(())
    }
}
