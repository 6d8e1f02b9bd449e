use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

// Position is the verbosity count `-v` would produce.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept either a verbosity count (0-5) or a level name for `TTB_AUTH_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|level: &str| -> Result<u8, String> {
        if let Ok(count) = level.parse::<u8>() {
            return if count <= 5 {
                Ok(count)
            } else {
                Err(format!("log level count {count} is above 5"))
            };
        }

        let name = level.to_lowercase();
        LEVELS
            .iter()
            .position(|candidate| *candidate == name)
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("unknown log level '{level}', expected one of {LEVELS:?}"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log more: -v warn, -vv info, -vvv debug, -vvvv trace")
            .long_help(
                "Increase log verbosity. Only errors are logged by default. \
                 RUST_LOG directives take precedence; lapin and hyper stay capped.",
            )
            .env("TTB_AUTH_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
