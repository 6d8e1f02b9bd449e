use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::session::{Session, SessionIdentity};

#[derive(Serialize, ToSchema)]
pub struct IndexView {
    identity: SessionIdentity,
    flashes: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Signed-in landing view", body = IndexView),
        (status = 303, description = "Not signed in, redirect to /login")
    ),
    tag = "web"
)]
pub async fn index(Extension(session): Extension<Session>) -> Response {
    let Some(identity) = session.identity().await else {
        return Redirect::to("/login").into_response();
    };
    let flashes = session.take_flashes().await;
    Json(IndexView { identity, flashes }).into_response()
}
