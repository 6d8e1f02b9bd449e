use crate::{
    api::router,
    session::{DEFAULT_SESSION_TTL, SessionStore},
    users::{AccountWrite, CredentialStore, MemoryStore, seed_bootstrap_account},
};
use anyhow::{Result, anyhow};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Browser stand-in that keeps the session cookie between requests.
struct Client {
    app: Router,
    cookie: Option<String>,
}

impl Client {
    fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    async fn send(&mut self, method: &str, uri: &str, form: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = &self.cookie {
            builder = builder.header(COOKIE, format!("ttb-auth={token}"));
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };
        let response = self.app.clone().oneshot(builder.body(body)?).await?;

        if let Some(set_cookie) = response.headers().get(SET_COOKIE) {
            let pair = set_cookie.to_str()?.split(';').next().unwrap_or_default();
            let token = pair.split_once('=').map(|(_, v)| v).unwrap_or_default();
            self.cookie = (!token.is_empty()).then(|| token.to_string());
        }
        Ok(response)
    }

    async fn get(&mut self, uri: &str) -> Result<Response> {
        self.send("GET", uri, None).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Result<Response> {
        self.send("POST", uri, Some(form)).await
    }
}

async fn json(response: Response) -> Result<Value> {
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn location(response: &Response) -> Option<&str> {
    response.headers().get(LOCATION)?.to_str().ok()
}

async fn app_with_sa() -> Result<(Arc<MemoryStore>, Router)> {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn CredentialStore> = memory.clone();
    seed_bootstrap_account(&store, SecretString::from("s3kr3t")).await?;
    let sessions = Arc::new(SessionStore::new(DEFAULT_SESSION_TTL, false));
    Ok((memory, router(store, sessions)))
}

async fn logged_in_client() -> Result<(Arc<MemoryStore>, Client)> {
    let (store, app) = app_with_sa().await?;
    let mut client = Client::new(app);
    let response = client.post("/login", "username=sa&password=s3kr3t").await?;
    assert_eq!(location(&response), Some("/"));
    Ok((store, client))
}

#[tokio::test]
async fn anonymous_index_redirects_to_login() -> Result<()> {
    let (_store, app) = app_with_sa().await?;
    let mut client = Client::new(app);
    let response = client.get("/").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn successful_login_binds_identity() -> Result<()> {
    let (_store, mut client) = logged_in_client().await?;
    assert!(client.cookie.is_some());

    let response = client.get("/").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json(response).await?;
    assert_eq!(
        payload.pointer("/identity/username").and_then(Value::as_str),
        Some("sa")
    );
    Ok(())
}

#[tokio::test]
async fn failed_login_flashes_once() -> Result<()> {
    let (_store, app) = app_with_sa().await?;
    let mut client = Client::new(app);

    let response = client.post("/login", "username=sa&password=wrong").await?;
    assert_eq!(location(&response), Some("/login"));

    let payload = json(client.get("/login").await?).await?;
    assert_eq!(payload["hidenav"], Value::Bool(true));
    assert_eq!(payload["error"], Value::from("Authentication failed"));

    let payload = json(client.get("/login").await?).await?;
    assert_eq!(payload["error"], Value::Null);

    let response = client.get("/").await?;
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn unknown_user_gets_same_message_as_wrong_password() -> Result<()> {
    let (_store, app) = app_with_sa().await?;
    let mut client = Client::new(app);
    client.post("/login", "username=ghost&password=s3kr3t").await?;
    let payload = json(client.get("/login").await?).await?;
    assert_eq!(payload["error"], Value::from("Authentication failed"));
    Ok(())
}

#[tokio::test]
async fn inactive_user_is_told_so() -> Result<()> {
    let (store, app) = app_with_sa().await?;
    store
        .write(AccountWrite::new("bob", SecretString::from("pw")).with_active(false))
        .await?;
    let mut client = Client::new(app);

    client.post("/login", "username=bob&password=pw").await?;
    let payload = json(client.get("/login").await?).await?;
    assert_eq!(payload["error"], Value::from("User is inactive"));
    Ok(())
}

#[tokio::test]
async fn storage_outage_during_login_is_a_server_error() -> Result<()> {
    let (store, app) = app_with_sa().await?;
    store.set_offline(true);
    let mut client = Client::new(app);
    let response = client.post("/login", "username=sa&password=s3kr3t").await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn logout_returns_to_anonymous() -> Result<()> {
    let (_store, mut client) = logged_in_client().await?;
    let response = client.get("/logout").await?;
    assert_eq!(location(&response), Some("/"));
    assert!(client.cookie.is_none());

    let response = client.get("/users/list").await?;
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn user_routes_require_login() -> Result<()> {
    let (_store, app) = app_with_sa().await?;
    let mut client = Client::new(app);
    for uri in [
        "/users/list",
        "/users/add",
        "/users/view/00000000-0000-0000-0000-000000000000",
        "/users/edit/00000000-0000-0000-0000-000000000000",
        "/users/delete/00000000-0000-0000-0000-000000000000",
    ] {
        let response = client.get(uri).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), Some("/login"), "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn add_user_reports_every_problem_and_echoes_form() -> Result<()> {
    let (store, mut client) = logged_in_client().await?;

    let response = client
        .post(
            "/users/add",
            "username=alice&email=alice%40example.com&phone=555&password=&password2=x",
        )
        .await?;
    assert_eq!(location(&response), Some("/users/add"));

    let payload = json(client.get("/users/add").await?).await?;
    let errors: Vec<&str> = payload["errors"]
        .as_array()
        .ok_or_else(|| anyhow!("errors missing"))?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.contains(&"empty password"));
    assert!(errors.contains(&"the passwords don't match"));
    assert_eq!(payload["form"]["username"], Value::from("alice"));
    assert_eq!(payload["form"]["email"], Value::from("alice@example.com"));
    assert!(payload["form"].get("password").is_none());

    // The echo is one-shot.
    let payload = json(client.get("/users/add").await?).await?;
    assert_eq!(payload["form"]["username"], Value::from(""));
    assert_eq!(store.list().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn add_user_then_list() -> Result<()> {
    let (_store, mut client) = logged_in_client().await?;

    let response = client
        .post(
            "/users/add",
            "username=alice&email=alice%40example.com&phone=&password=pw&password2=pw",
        )
        .await?;
    assert_eq!(location(&response), Some("/users/list"));

    let payload = json(client.get("/users/list").await?).await?;
    let names: Vec<&str> = payload["users"]
        .as_array()
        .ok_or_else(|| anyhow!("users missing"))?
        .iter()
        .filter_map(|user| user["username"].as_str())
        .collect();
    assert_eq!(names, vec!["alice", "sa"]);
    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_a_validation_message() -> Result<()> {
    let (_store, mut client) = logged_in_client().await?;
    client
        .post(
            "/users/add",
            "username=sa&email=sa%40example.com&password=pw&password2=pw",
        )
        .await?;
    let payload = json(client.get("/users/add").await?).await?;
    assert_eq!(
        payload["errors"],
        serde_json::json!(["that username already exists"])
    );
    Ok(())
}

#[tokio::test]
async fn edit_keeps_active_flag_and_allows_same_username() -> Result<()> {
    let (store, mut client) = logged_in_client().await?;
    let bob = store
        .write(
            AccountWrite::new("bob", SecretString::from("pw"))
                .with_email("bob@example.com")
                .with_active(false),
        )
        .await?;

    let uri = format!("/users/edit/{}", bob.id);
    let payload = json(client.get(&uri).await?).await?;
    assert_eq!(payload["form"]["email"], Value::from("bob@example.com"));
    assert_eq!(payload["active"], Value::Bool(false));

    let response = client
        .post(
            &uri,
            "username=bob&email=bob%40example.org&phone=1&password=new&password2=new",
        )
        .await?;
    assert_eq!(location(&response), Some("/users/list"));

    let updated = store
        .find_by_identity(bob.id)
        .await?
        .ok_or_else(|| anyhow!("bob missing"))?;
    assert_eq!(updated.email, "bob@example.org");
    assert!(!updated.active);
    assert_ne!(updated.token, bob.token);
    Ok(())
}

#[tokio::test]
async fn edit_of_unknown_account_is_not_found() -> Result<()> {
    let (_store, mut client) = logged_in_client().await?;
    let response = client
        .get("/users/edit/00000000-0000-0000-0000-000000000000")
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn view_hides_secrets() -> Result<()> {
    let (store, mut client) = logged_in_client().await?;
    let sa = store.list().await?.remove(0);
    let payload = json(client.get(&format!("/users/view/{}", sa.id)).await?).await?;
    assert_eq!(payload["username"], Value::from("sa"));
    assert!(payload.get("token").is_none());
    assert!(payload.get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn delete_is_not_implemented() -> Result<()> {
    let (store, mut client) = logged_in_client().await?;
    let sa = store.list().await?.remove(0);
    let response = client.get(&format!("/users/delete/{}", sa.id)).await?;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(store.list().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn health_reflects_storage() -> Result<()> {
    let (store, app) = app_with_sa().await?;
    let mut client = Client::new(app);

    let response = client.get("/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-App").is_some());
    let payload = json(response).await?;
    assert_eq!(payload["database"], Value::from("ok"));
    assert_eq!(payload["name"], Value::from("ttb-auth"));

    store.set_offline(true);
    let response = client.get("/health").await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = json(response).await?;
    assert_eq!(payload["database"], Value::from("error"));
    Ok(())
}
