//! Queue RPC gateway.
//!
//! Exposes the authenticator and the directory over AMQP request/reply
//! queues. Each operation gets its own channel (prefetch 1) and its own
//! worker task; replies go to the caller's `reply_to` queue tagged with the
//! caller's correlation id.

mod handlers;
mod messages;
mod worker;

pub use handlers::{
    ADD_USER, AUTHENTICATE, AddUserHandler, AuthenticateHandler, LIST_USERS, ListUsersHandler,
    RpcHandler,
};
pub use messages::*;

use anyhow::{Context, Result};
use lapin::{
    Connection, ConnectionProperties,
    options::{BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::info;

use crate::{api::APP_USER_AGENT, auth::Authenticator, directory::DirectoryService};

pub const DEFAULT_QUEUE_PREFIX: &str = "ttb.auth";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    url: SecretString,
    prefix: String,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(url: SecretString) -> Self {
        Self {
            url,
            prefix: DEFAULT_QUEUE_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[must_use]
pub fn queue_name(prefix: &str, operation: &str) -> String {
    if prefix.is_empty() {
        operation.to_string()
    } else {
        format!("{}.{operation}", prefix.trim_end_matches('.'))
    }
}

/// Every operation the gateway serves.
#[must_use]
pub fn handlers(
    authenticator: Authenticator,
    directory: DirectoryService,
) -> Vec<Arc<dyn RpcHandler>> {
    vec![
        Arc::new(AuthenticateHandler::new(authenticator)),
        Arc::new(ListUsersHandler::new(directory)),
        Arc::new(AddUserHandler),
    ]
}

pub struct Gateway {
    connection: Connection,
    workers: Vec<JoinHandle<()>>,
}

/// Connect, declare every queue and spawn one worker per queue.
///
/// When any worker stops, a message is sent on `shutdown`.
///
/// # Errors
/// Fails if the broker is unreachable or a queue cannot be declared.
pub async fn start(
    config: &GatewayConfig,
    handlers: Vec<Arc<dyn RpcHandler>>,
    shutdown: UnboundedSender<()>,
) -> Result<Gateway> {
    let properties = ConnectionProperties::default().with_connection_name(APP_USER_AGENT.into());
    let connection = Connection::connect(config.url.expose_secret(), properties)
        .await
        .context("Failed to connect to AMQP broker")?;

    let mut ready = Vec::with_capacity(handlers.len());
    for handler in handlers {
        let queue = queue_name(&config.prefix, handler.operation());
        let channel = connection
            .create_channel()
            .await
            .with_context(|| format!("Failed to open channel for {queue}"))?;
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .with_context(|| format!("Failed to set prefetch for {queue}"))?;
        channel
            .queue_declare(&queue, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .with_context(|| format!("Failed to declare queue {queue}"))?;
        info!(queue = %queue, "queue declared");
        ready.push((channel, queue, handler));
    }

    let workers = ready
        .into_iter()
        .map(|(channel, queue, handler)| {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let consumer = worker::run(channel, queue.clone(), handler);
                worker::supervise(&queue, consumer, shutdown).await;
            })
        })
        .collect();

    Ok(Gateway {
        connection,
        workers,
    })
}

impl Gateway {
    /// Stop the workers and close the broker connection.
    ///
    /// # Errors
    /// Returns an error if the connection does not close cleanly.
    pub async fn close(self) -> Result<()> {
        for worker in &self.workers {
            worker.abort();
        }
        self.connection
            .close(200, "shutting down")
            .await
            .context("Failed to close AMQP connection")
    }
}
