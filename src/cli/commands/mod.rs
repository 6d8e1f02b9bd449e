pub mod amqp;
pub mod bootstrap;
pub mod database;
pub mod logging;
pub mod session;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_LISTEN: &str = "listen";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::api::GIT_COMMIT_HASH)
            .into_boxed_str(),
    );

    let command = Command::new("ttb-auth")
        .about("Identity service: credentials, user directory and sessions")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TTB_AUTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_LISTEN)
                .short('l')
                .long("listen")
                .help("Address to bind the web server to")
                .default_value("::")
                .env("TTB_AUTH_LISTEN")
                .value_parser(clap::value_parser!(std::net::IpAddr)),
        );

    let command = database::with_args(command);
    let command = amqp::with_args(command);
    let command = session::with_args(command);
    let command = bootstrap::with_args(command);
    logging::with_args(command)
}
