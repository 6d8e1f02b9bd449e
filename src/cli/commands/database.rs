use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_USER: &str = "db-user";
pub const ARG_DB_PASSWORD: &str = "db-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .long_help(
                    "PostgreSQL connection string. Credentials in the DSN are replaced by --db-user/--db-password when those are set.",
                )
                .env("TTB_AUTH_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DB_USER)
                .long("db-user")
                .help("Database user, overrides the DSN user")
                .env("TTB_AUTH_DB_USER"),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long("db-password")
                .help("Database password, overrides the DSN password")
                .env("TTB_AUTH_DB_PASSWORD")
                .hide_env_values(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub dsn: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl Options {
    /// # Errors
    /// Returns an error if `--dsn` is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        Ok(Self {
            dsn,
            user: matches.get_one::<String>(ARG_DB_USER).cloned(),
            password: matches
                .get_one::<String>(ARG_DB_PASSWORD)
                .map(|password| SecretString::from(password.clone())),
        })
    }
}
