use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    auth::{AuthError, Authenticator},
    session::{Session, SessionIdentity},
};

#[derive(Serialize, ToSchema)]
pub struct LoginView {
    hidenav: bool,
    error: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login view with the first pending message", body = LoginView)
    ),
    tag = "web"
)]
pub async fn login_page(Extension(session): Extension<Session>) -> Json<LoginView> {
    let error = session.take_flashes().await.into_iter().next();
    Json(LoginView {
        hidenav: true,
        error,
    })
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to / on success, back to /login on failure"),
        (status = 500, description = "Credential storage unavailable")
    ),
    tag = "web"
)]
pub async fn login(
    Extension(session): Extension<Session>,
    Extension(authenticator): Extension<Authenticator>,
    Form(form): Form<LoginForm>,
) -> Response {
    match authenticator
        .authenticate(form.username.trim(), &form.password)
        .await
    {
        Ok(account) => {
            info!(user.id = %account.id, "user logged in");
            session.login(SessionIdentity::from(&account)).await;
            Redirect::to("/").into_response()
        }
        Err(err @ (AuthError::AuthenticationFailed | AuthError::UserInactive)) => {
            session.logout().await;
            session.flash(err.to_string()).await;
            Redirect::to("/login").into_response()
        }
        Err(err @ AuthError::Operational(_)) => {
            error!("Login failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 303, description = "Session cleared, redirect to /")
    ),
    tag = "web"
)]
pub async fn logout(Extension(session): Extension<Session>) -> Redirect {
    session.logout().await;
    Redirect::to("/")
}
