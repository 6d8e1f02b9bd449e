//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_LISTEN, ARG_PORT, amqp, bootstrap, database, session};
use anyhow::Result;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let listen = matches
        .get_one::<IpAddr>(ARG_LISTEN)
        .copied()
        .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED));

    let database_opts = database::Options::parse(matches)?;
    let amqp_opts = amqp::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches);
    let bootstrap_opts = bootstrap::Options::parse(matches);

    Ok(Action::Server(Args {
        addr: SocketAddr::new(listen, port),
        dsn: database_opts.dsn,
        db_user: database_opts.user,
        db_password: database_opts.password,
        amqp_url: amqp_opts.url,
        amqp_user: amqp_opts.user,
        amqp_password: amqp_opts.password,
        queue_prefix: amqp_opts.queue_prefix,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_cookie_secure: session_opts.cookie_secure,
        seed_admin_password: bootstrap_opts.admin_password,
    }))
}
