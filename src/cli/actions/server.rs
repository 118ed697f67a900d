use crate::{
    api,
    auth::{
        clock::SystemClock,
        state::{AuthConfig, AuthState},
    },
    cli::actions::Action,
    repos::RepoStore,
    users::{JsonUserStore, UserStore},
};
use anyhow::Result;
use std::sync::Arc;
use url::Url;

/// Handle the server action
/// # Errors
/// Returns an error if the server fails to start
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        data_dir,
        base_url,
        session_ttl,
        max_sessions,
        max_failed_attempts,
        failed_window,
    } = action
    else {
        return Ok(());
    };

    let base_url = Url::parse(&base_url)?;

    let config = AuthConfig::new(base_url.to_string())
        .with_session_ttl_minutes(session_ttl)
        .with_max_sessions(max_sessions)
        .with_max_failed_attempts(max_failed_attempts)
        .with_failed_window_minutes(failed_window);

    let auth = Arc::new(AuthState::new(config, Arc::new(SystemClock)));
    let users: Arc<dyn UserStore> = Arc::new(JsonUserStore::new(data_dir.join("users.json")));
    let repos = Arc::new(RepoStore::new(data_dir.join("repos")));

    api::new(port, auth, users, repos).await?;

    Ok(())
}
