use clap::{
    Arg, ColorChoice, Command,
    builder::{ValueParser, styling::{AnsiColor, Effects, Styles}},
};
use std::path::PathBuf;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("minihub")
        .about("Self-hosted remote hub for gitmini repositories")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("MINIHUB_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .help("Directory holding users.json and the hosted repositories")
                .default_value("data")
                .env("MINIHUB_DATA_DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("Public base URL used to build browser login links")
                .default_value("http://localhost:8080")
                .env("MINIHUB_BASE_URL"),
        )
        .arg(
            Arg::new("session-ttl")
                .long("session-ttl")
                .help("CLI login session time-to-live in minutes")
                .default_value("10")
                .env("MINIHUB_SESSION_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("max-sessions")
                .long("max-sessions")
                .help("Maximum number of concurrent CLI login sessions")
                .default_value("100")
                .env("MINIHUB_MAX_SESSIONS")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max-failed-attempts")
                .long("max-failed-attempts")
                .help("Failed logins per origin before new attempts are rejected")
                .default_value("5")
                .env("MINIHUB_MAX_FAILED_ATTEMPTS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("failed-window")
                .long("failed-window")
                .help("Rolling window in minutes for counting failed logins")
                .default_value("10")
                .env("MINIHUB_FAILED_WINDOW")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("MINIHUB_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(
            Command::new("user-add")
                .about("Create a user in the credential store")
                .arg(
                    Arg::new("username")
                        .help("Username, lowercase letters, numbers and dashes")
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password for the new user")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("repo-init")
                .about("Provision an empty hosted repository for a user")
                .arg(Arg::new("username").help("Owner of the repository").required(true))
                .arg(Arg::new("repo").help("Repository name").required(true)),
        )
}
