use crate::{
    cli::actions::Action,
    repos::{RepoStore, valid_repo_name},
    users::{JsonUserStore, RepoEntry, UserStore, normalize_username},
};
use anyhow::{Result, anyhow};
use chrono::Utc;

/// Handle the repo-init action
/// # Errors
/// Returns an error for unknown users, invalid or duplicate repository
/// names, or store failures
pub fn handle(action: Action) -> Result<()> {
    let Action::RepoInit {
        data_dir,
        username,
        repo,
    } = action
    else {
        return Ok(());
    };

    let username = normalize_username(&username);
    let store = JsonUserStore::new(data_dir.join("users.json"));
    let Some(mut record) = store.get(&username)? else {
        return Err(anyhow!("unknown user: {username}"));
    };

    if !valid_repo_name(&repo) {
        return Err(anyhow!("invalid repository name: {repo}"));
    }

    let repos = RepoStore::new(data_dir.join("repos"));
    if !repos.init_repo(&username, &repo)? {
        return Err(anyhow!("repository already exists: {username}/{repo}"));
    }

    if !record.has_repo(&repo) {
        record.repos.push(RepoEntry {
            name: repo.clone(),
            created_at: Utc::now(),
        });
        store.put(&username, record)?;
    }

    println!("repository created: {username}/{repo}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::user_add;
    use tempfile::TempDir;

    fn repo_init(data_dir: &TempDir, username: &str, repo: &str) -> Result<()> {
        handle(Action::RepoInit {
            data_dir: data_dir.path().to_path_buf(),
            username: username.to_string(),
            repo: repo.to_string(),
        })
    }

    #[test]
    fn provisions_the_repository_and_registers_it_on_the_record() {
        let dir = TempDir::new().unwrap();
        user_add::handle(Action::UserAdd {
            data_dir: dir.path().to_path_buf(),
            username: "gina".to_string(),
            password: "hunter2".to_string(),
        })
        .unwrap();

        repo_init(&dir, "gina", "repo1").unwrap();

        let store = JsonUserStore::new(dir.path().join("users.json"));
        assert!(store.get("gina").unwrap().unwrap().has_repo("repo1"));

        let repos = RepoStore::new(dir.path().join("repos"));
        assert!(repos.repo_exists("gina", "repo1"));
        assert_eq!(
            repos.read_branch("gina", "repo1", "main").unwrap(),
            Some(String::new())
        );

        // Same name again is refused.
        assert!(repo_init(&dir, "gina", "repo1").is_err());
    }

    #[test]
    fn requires_an_existing_user_and_a_valid_name() {
        let dir = TempDir::new().unwrap();

        assert!(repo_init(&dir, "ghost", "repo1").is_err());

        user_add::handle(Action::UserAdd {
            data_dir: dir.path().to_path_buf(),
            username: "gina".to_string(),
            password: "hunter2".to_string(),
        })
        .unwrap();
        assert!(repo_init(&dir, "gina", ".hidden").is_err());
        assert!(repo_init(&dir, "gina", "Repo").is_err());
    }
}
