use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SEED_ADMIN: &str = "seed-admin";
pub const ARG_SEED_ADMIN_PASSWORD: &str = "seed-admin-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SEED_ADMIN)
                .long("seed-admin")
                .help("Create the `sa` account at startup when it does not exist")
                .env("TTB_AUTH_SEED_ADMIN")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SEED_ADMIN_PASSWORD)
                .long("seed-admin-password")
                .help("Initial password for the `sa` account")
                .env("TTB_AUTH_SEED_ADMIN_PASSWORD")
                .hide_env_values(true)
                .hide_default_value(true)
                .default_value("s3kr3t"),
        )
}

#[derive(Debug)]
pub struct Options {
    /// `None` when seeding is disabled.
    pub admin_password: Option<SecretString>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let enabled = matches
            .get_one::<bool>(ARG_SEED_ADMIN)
            .copied()
            .unwrap_or(true);
        let admin_password = if enabled {
            matches
                .get_one::<String>(ARG_SEED_ADMIN_PASSWORD)
                .map(|password| SecretString::from(password.clone()))
        } else {
            None
        };
        Self { admin_password }
    }
}
