use crate::{
    auth::{
        rate_limit::{DEFAULT_FAILURE_WINDOW_MINUTES, DEFAULT_MAX_FAILURES},
        sessions::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL_MINUTES},
    },
    cli::actions::Action,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Map parsed arguments to an action.
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .cloned()
        .context("missing required argument: --data-dir")?;

    match matches.subcommand() {
        Some(("user-add", sub)) => Ok(Action::UserAdd {
            data_dir,
            username: sub
                .get_one::<String>("username")
                .cloned()
                .context("missing required argument: username")?,
            password: sub
                .get_one::<String>("password")
                .cloned()
                .context("missing required argument: --password")?,
        }),
        Some(("repo-init", sub)) => Ok(Action::RepoInit {
            data_dir,
            username: sub
                .get_one::<String>("username")
                .cloned()
                .context("missing required argument: username")?,
            repo: sub
                .get_one::<String>("repo")
                .cloned()
                .context("missing required argument: repo")?,
        }),
        _ => Ok(Action::Server {
            port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
            data_dir,
            base_url: matches
                .get_one::<String>("base-url")
                .cloned()
                .context("missing required argument: --base-url")?,
            session_ttl: matches
                .get_one::<i64>("session-ttl")
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_MINUTES),
            max_sessions: matches
                .get_one::<usize>("max-sessions")
                .copied()
                .unwrap_or(DEFAULT_MAX_SESSIONS),
            max_failed_attempts: matches
                .get_one::<u32>("max-failed-attempts")
                .copied()
                .unwrap_or(DEFAULT_MAX_FAILURES),
            failed_window: matches
                .get_one::<i64>("failed-window")
                .copied()
                .unwrap_or(DEFAULT_FAILURE_WINDOW_MINUTES),
        }),
    }
}
