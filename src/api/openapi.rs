use super::handlers::{health, login, root, users};
use crate::{
    session::{FormEcho, SessionIdentity},
    users::{Account, AccountSummary, validation::UserForm},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        root::index,
        login::login_page,
        login::login,
        login::logout,
        users::list,
        users::add_page,
        users::add,
        users::view,
        users::edit_page,
        users::edit,
        users::delete,
    ),
    components(schemas(
        health::Health,
        root::IndexView,
        login::LoginView,
        login::LoginForm,
        users::UserListView,
        users::UserFormView,
        users::NotImplementedView,
        Account,
        AccountSummary,
        UserForm,
        FormEcho,
        SessionIdentity,
    )),
    tags(
        (name = "web", description = "Login and session views"),
        (name = "users", description = "User administration, login required"),
        (name = "health", description = "Liveness of the service and its database")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = Some(env!("CARGO_PKG_DESCRIPTION").to_string());
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/",
            "/health",
            "/login",
            "/logout",
            "/users/list",
            "/users/add",
            "/users/view/{id}",
            "/users/edit/{id}",
            "/users/delete/{id}",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
        assert_eq!(doc.info.title, "ttb-auth");
    }
}
