use crate::{
    amqp::{self, GatewayConfig},
    api,
    auth::Authenticator,
    cli::telemetry,
    directory::DirectoryService,
    session::SessionStore,
    users::{self, CredentialStore, PgStore},
};
use anyhow::{Context, Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub addr: SocketAddr,
    pub dsn: String,
    pub db_user: Option<String>,
    pub db_password: Option<SecretString>,
    pub amqp_url: String,
    pub amqp_user: Option<String>,
    pub amqp_password: Option<SecretString>,
    pub queue_prefix: String,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
    pub seed_admin_password: Option<SecretString>,
}

/// Replace the userinfo of `url` with the given credentials, when present.
fn with_credentials(
    url: &str,
    user: Option<&str>,
    password: Option<&SecretString>,
) -> Result<SecretString> {
    let mut url = Url::parse(url).context("Invalid URL")?;

    if let Some(user) = user {
        url.set_username(user)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if let Some(password) = password {
        url.set_password(Some(password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(SecretString::from(url.to_string()))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database or the broker is unreachable, a queue cannot
/// be declared, or the web server fails.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let dsn = with_credentials(&args.dsn, args.db_user.as_deref(), args.db_password.as_ref())
        .context("Invalid database DSN")?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store: Arc<dyn CredentialStore> = Arc::new(PgStore::new(pool));

    if let Some(password) = args.seed_admin_password {
        users::seed_bootstrap_account(&store, password)
            .await
            .context("Failed to create the bootstrap account")?;
    }

    let amqp_url = with_credentials(
        &args.amqp_url,
        args.amqp_user.as_deref(),
        args.amqp_password.as_ref(),
    )
    .context("Invalid AMQP URL")?;

    // Any worker that stops takes the web server down with it.
    let (tx, rx) = mpsc::unbounded_channel();

    let gateway_config = GatewayConfig::new(amqp_url).with_prefix(args.queue_prefix);
    let gateway = amqp::start(
        &gateway_config,
        amqp::handlers(
            Authenticator::new(store.clone()),
            DirectoryService::new(store.clone()),
        ),
        tx,
    )
    .await?;
    info!(prefix = gateway_config.prefix(), "queue gateway started");

    let sessions = Arc::new(SessionStore::new(
        Duration::from_secs(args.session_ttl_seconds),
        args.session_cookie_secure,
    ));

    let served = api::new(args.addr, store, sessions, rx).await;

    if let Err(err) = gateway.close().await {
        error!("{err:#}");
    }
    telemetry::shutdown_tracer();

    served
}
