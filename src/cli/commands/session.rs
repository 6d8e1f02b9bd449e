use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long("session-ttl-seconds")
                .help("Idle lifetime of a web session in seconds")
                .env("TTB_AUTH_SESSION_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long("session-cookie-secure")
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("TTB_AUTH_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Options {
    pub ttl_seconds: u64,
    pub cookie_secure: bool,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(900),
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
        }
    }
}
