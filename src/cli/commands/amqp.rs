use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::amqp::DEFAULT_QUEUE_PREFIX;

pub const ARG_AMQP_URL: &str = "amqp-url";
pub const ARG_AMQP_USER: &str = "amqp-user";
pub const ARG_AMQP_PASSWORD: &str = "amqp-password";
pub const ARG_QUEUE_PREFIX: &str = "queue-prefix";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AMQP_URL)
                .long("amqp-url")
                .help("AMQP broker URL, example: amqp://rabbitmq.tld:5672/%2f")
                .env("TTB_AUTH_AMQP_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_AMQP_USER)
                .long("amqp-user")
                .help("Broker user, overrides the URL user")
                .env("TTB_AUTH_AMQP_USER"),
        )
        .arg(
            Arg::new(ARG_AMQP_PASSWORD)
                .long("amqp-password")
                .help("Broker password, overrides the URL password")
                .env("TTB_AUTH_AMQP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_QUEUE_PREFIX)
                .long("queue-prefix")
                .help("Namespace for the RPC queue names")
                .env("TTB_AUTH_QUEUE_PREFIX")
                .default_value(DEFAULT_QUEUE_PREFIX),
        )
}

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub queue_prefix: String,
}

impl Options {
    /// # Errors
    /// Returns an error if `--amqp-url` is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_AMQP_URL)
            .cloned()
            .context("missing required argument: --amqp-url")?;
        Ok(Self {
            url,
            user: matches.get_one::<String>(ARG_AMQP_USER).cloned(),
            password: matches
                .get_one::<String>(ARG_AMQP_PASSWORD)
                .map(|password| SecretString::from(password.clone())),
            queue_prefix: matches
                .get_one::<String>(ARG_QUEUE_PREFIX)
                .cloned()
                .unwrap_or_else(|| DEFAULT_QUEUE_PREFIX.to_string()),
        })
    }
}
