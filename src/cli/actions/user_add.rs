use crate::{
    auth::password::hash_password,
    cli::actions::Action,
    users::{JsonUserStore, UserRecord, UserStore, normalize_username, valid_username},
};
use anyhow::{Result, anyhow};

/// Handle the user-add action
/// # Errors
/// Returns an error for invalid or duplicate usernames, or store failures
pub fn handle(action: Action) -> Result<()> {
    let Action::UserAdd {
        data_dir,
        username,
        password,
    } = action
    else {
        return Ok(());
    };

    let username = normalize_username(&username);
    if !valid_username(&username) {
        return Err(anyhow!(
            "invalid username, use only lowercase letters, numbers, or dashes"
        ));
    }

    let store = JsonUserStore::new(data_dir.join("users.json"));
    if store.exists(&username)? {
        return Err(anyhow!("user already exists: {username}"));
    }

    let record = UserRecord {
        password_hash: hash_password(&password)?,
        repos: Vec::new(),
        api_keys: Vec::new(),
    };
    store.put(&username, record)?;

    println!("user created: {username}");

    Ok(())
}
