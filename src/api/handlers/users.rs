//! User administration views. Every route here sits behind the login gate.

use axum::{
    extract::{Extension, Form, Path},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use secrecy::SecretString;
use serde::Serialize;
use std::{fmt::Display, sync::Arc};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    directory::DirectoryService,
    session::{FormEcho, Session, SessionIdentity},
    users::{
        Account, AccountSummary, AccountWrite, CredentialStore, StoreError,
        validation::{self, USERNAME_EXISTS, UserForm},
    },
};

#[derive(Serialize, ToSchema)]
pub struct UserListView {
    users: Vec<AccountSummary>,
    flashes: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserFormView {
    id: Option<Uuid>,
    form: FormEcho,
    active: bool,
    errors: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct NotImplementedView {
    error: String,
}

fn echo(form: &UserForm) -> FormEcho {
    FormEcho {
        username: form.username().to_string(),
        email: form.email().to_string(),
        phone: form.phone().to_string(),
    }
}

fn internal_error(context: &str, err: impl Display) -> Response {
    error!("{context}: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}

/// Flash every message, keep the submitted values for one re-render, and go back.
async fn reject(
    session: &Session,
    form: &UserForm,
    errors: Vec<String>,
    back_to: &str,
) -> Response {
    for message in errors {
        session.flash(message).await;
    }
    session.echo_form(echo(form)).await;
    Redirect::to(back_to).into_response()
}

fn account_write(form: &UserForm, active: bool) -> AccountWrite {
    AccountWrite::new(form.username(), SecretString::from(form.password.clone()))
        .with_email(form.email())
        .with_phone(form.phone())
        .with_active(active)
}

#[utoipa::path(
    get,
    path = "/users/list",
    responses(
        (status = 200, description = "All accounts ordered by username", body = UserListView),
        (status = 303, description = "Not signed in"),
        (status = 500, description = "Directory unavailable")
    ),
    tag = "users"
)]
pub async fn list(
    Extension(session): Extension<Session>,
    Extension(directory): Extension<DirectoryService>,
) -> Response {
    match directory.list().await {
        Ok(users) => {
            let flashes = session.take_flashes().await;
            Json(UserListView { users, flashes }).into_response()
        }
        Err(err) => internal_error("Failed to list users", err),
    }
}

#[utoipa::path(
    get,
    path = "/users/add",
    responses(
        (status = 200, description = "Empty form, or the last rejected submission", body = UserFormView),
        (status = 303, description = "Not signed in")
    ),
    tag = "users"
)]
pub async fn add_page(Extension(session): Extension<Session>) -> Json<UserFormView> {
    let form = session.take_form().await.unwrap_or_default();
    let errors = session.take_flashes().await;
    Json(UserFormView {
        id: None,
        form,
        active: true,
        errors,
    })
}

#[utoipa::path(
    post,
    path = "/users/add",
    request_body(content = UserForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to /users/list when created, back to /users/add with messages otherwise"),
        (status = 500, description = "Storage unavailable")
    ),
    tag = "users"
)]
pub async fn add(
    Extension(session): Extension<Session>,
    Extension(store): Extension<Arc<dyn CredentialStore>>,
    Form(form): Form<UserForm>,
) -> Response {
    let errors = match validation::validate(&form, store.as_ref(), None).await {
        Ok(errors) => errors,
        Err(err) => return internal_error("Failed to validate user", err),
    };
    if !errors.is_empty() {
        return reject(&session, &form, errors, "/users/add").await;
    }

    match store
        .write(account_write(&form, form.active().unwrap_or(true)))
        .await
    {
        Ok(account) => {
            info!(user.id = %account.id, "user created");
            Redirect::to("/users/list").into_response()
        }
        Err(StoreError::UsernameTaken) => {
            reject(&session, &form, vec![USERNAME_EXISTS.to_string()], "/users/add").await
        }
        Err(err) => internal_error("Failed to create user", err),
    }
}

#[utoipa::path(
    get,
    path = "/users/view/{id}",
    params(("id" = Uuid, Path, description = "Account identity")),
    responses(
        (status = 200, description = "Account details", body = Account),
        (status = 303, description = "Not signed in"),
        (status = 404, description = "No such account"),
        (status = 500, description = "Storage unavailable")
    ),
    tag = "users"
)]
pub async fn view(
    Path(id): Path<Uuid>,
    Extension(store): Extension<Arc<dyn CredentialStore>>,
) -> Response {
    match store.find_by_identity(id).await {
        Ok(Some(account)) => Json(account).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("Failed to load user", err),
    }
}

#[utoipa::path(
    get,
    path = "/users/edit/{id}",
    params(("id" = Uuid, Path, description = "Account identity")),
    responses(
        (status = 200, description = "Form prefilled from the account or the last rejected submission", body = UserFormView),
        (status = 303, description = "Not signed in"),
        (status = 404, description = "No such account"),
        (status = 500, description = "Storage unavailable")
    ),
    tag = "users"
)]
pub async fn edit_page(
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Extension(store): Extension<Arc<dyn CredentialStore>>,
) -> Response {
    let account = match store.find_by_identity(id).await {
        Ok(Some(account)) => account,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("Failed to load user", err),
    };

    let form = session.take_form().await.unwrap_or_else(|| FormEcho {
        username: account.username.clone(),
        email: account.email.clone(),
        phone: account.phone.clone(),
    });
    let errors = session.take_flashes().await;
    Json(UserFormView {
        id: Some(account.id),
        form,
        active: account.active,
        errors,
    })
    .into_response()
}

#[utoipa::path(
    post,
    path = "/users/edit/{id}",
    params(("id" = Uuid, Path, description = "Account identity")),
    request_body(content = UserForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to /users/list when saved, back to the edit form with messages otherwise"),
        (status = 404, description = "No such account"),
        (status = 500, description = "Storage unavailable")
    ),
    tag = "users"
)]
pub async fn edit(
    Path(id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Extension(store): Extension<Arc<dyn CredentialStore>>,
    Form(form): Form<UserForm>,
) -> Response {
    let existing = match store.find_by_identity(id).await {
        Ok(Some(account)) => account,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return internal_error("Failed to load user", err),
    };

    let back_to = format!("/users/edit/{id}");
    let errors = match validation::validate(&form, store.as_ref(), Some(id)).await {
        Ok(errors) => errors,
        Err(err) => return internal_error("Failed to validate user", err),
    };
    if !errors.is_empty() {
        return reject(&session, &form, errors, &back_to).await;
    }

    let active = form.active().unwrap_or(existing.active);
    match store.write(account_write(&form, active).with_id(id)).await {
        Ok(account) => {
            info!(user.id = %account.id, "user updated");
            let editing_self = session
                .identity()
                .await
                .is_some_and(|identity| identity.id == account.id);
            if editing_self {
                session.login(SessionIdentity::from(&account)).await;
            }
            Redirect::to("/users/list").into_response()
        }
        Err(StoreError::UsernameTaken) => {
            reject(&session, &form, vec![USERNAME_EXISTS.to_string()], &back_to).await
        }
        Err(StoreError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("Failed to update user", err),
    }
}

#[utoipa::path(
    get,
    path = "/users/delete/{id}",
    params(("id" = Uuid, Path, description = "Account identity")),
    responses(
        (status = 501, description = "Deleting accounts is not supported", body = NotImplementedView),
        (status = 303, description = "Not signed in")
    ),
    tag = "users"
)]
pub async fn delete(Path(id): Path<Uuid>) -> (StatusCode, Json<NotImplementedView>) {
    info!(user.id = %id, "delete requested but not supported");
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(NotImplementedView {
            error: "deleting users is not supported".to_string(),
        }),
    )
}
