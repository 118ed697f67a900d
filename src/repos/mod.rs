//! Hosted repository storage: on-disk layout, branch refs and fast-forward
//! updates.
//!
//! Layout per repository:
//!
//! ```text
//! <root>/<user>/<repo>/.gitmini/
//!     objects/                one opaque file per object id
//!     refs/heads/<branch>     branch tip commit id (empty while no commits)
//! ```
//!
//! Security boundaries:
//! - Path components coming from clients (branch names, object ids) are
//!   rejected if they could escape the repository directory.
//! - Ref updates are compare-and-swap under a store-wide lock; concurrent
//!   pushes serialize and exactly one of two conflicting updates wins.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;

const GITMINI_DIR: &str = ".gitmini";
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, thiserror::Error)]
pub enum RefUpdateError {
    #[error("Remote branch not found.")]
    BranchNotFound,
    #[error("Push rejected: non-fast-forward")]
    NonFastForward { current_tip: Option<String> },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct RepoStore {
    root: PathBuf,
    refs_lock: Mutex<()>,
}

impl RepoStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            refs_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this user hosts this repository.
    #[must_use]
    pub fn repo_exists(&self, user: &str, repo: &str) -> bool {
        plain_component(user) && plain_component(repo) && self.repo_path(user, repo).is_dir()
    }

    /// First user in `users` hosting `repo`. Callers pass the candidates
    /// they care about, typically everyone but the authenticated user.
    pub fn owner_among<'a, I>(&self, users: I, repo: &str) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        users
            .into_iter()
            .find(|candidate| self.repo_exists(candidate, repo))
            .map(str::to_string)
    }

    /// Create the on-disk skeleton for a new repository.
    ///
    /// The default branch starts with an empty tip. Returns `false` when
    /// the repository already exists.
    ///
    /// # Errors
    /// Returns an error for invalid names or filesystem failures.
    pub fn init_repo(&self, user: &str, repo: &str) -> Result<bool, std::io::Error> {
        if !plain_component(user) || !plain_component(repo) {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid repository path: {user}/{repo}"),
            ));
        }

        let marker = self.repo_path(user, repo).join(GITMINI_DIR);
        if marker.is_dir() {
            return Ok(false);
        }

        fs::create_dir_all(marker.join("objects"))?;
        let heads = self.heads_path(user, repo);
        fs::create_dir_all(&heads)?;
        fs::write(heads.join(DEFAULT_BRANCH), b"")?;
        Ok(true)
    }

    /// Branch name → tip for every ref in the repository.
    ///
    /// A missing refs directory reads as no branches.
    ///
    /// # Errors
    /// Returns an error if the refs directory cannot be read.
    pub fn list_branches(
        &self,
        user: &str,
        repo: &str,
    ) -> Result<BTreeMap<String, String>, std::io::Error> {
        let mut branches = BTreeMap::new();

        let entries = match fs::read_dir(self.heads_path(user, repo)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(branches),
            Err(err) => return Err(err),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let tip = fs::read_to_string(entry.path())?.trim().to_string();
            branches.insert(name, tip);
        }

        Ok(branches)
    }

    /// Current tip of a branch. `None` when the ref file does not exist; an
    /// empty string is a provisioned branch with no commits yet.
    ///
    /// # Errors
    /// Returns an error if the ref file cannot be read.
    pub fn read_branch(
        &self,
        user: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<String>, std::io::Error> {
        if !plain_component(branch) {
            return Ok(None);
        }

        match fs::read_to_string(self.heads_path(user, repo).join(branch)) {
            Ok(tip) => Ok(Some(tip.trim().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Replace a branch tip when the caller's expectation matches.
    ///
    /// The read-compare-write runs under the store-wide refs lock. An absent
    /// expectation is honored only while the branch has no commits yet;
    /// otherwise the caller must name the tip it built on.
    ///
    /// # Errors
    /// `BranchNotFound` if the ref does not exist, `NonFastForward` carrying
    /// the current tip on expectation mismatch.
    pub async fn update_branch(
        &self,
        user: &str,
        repo: &str,
        branch: &str,
        new_tip: &str,
        expected: Option<&str>,
    ) -> Result<String, RefUpdateError> {
        let _guard = self.refs_lock.lock().await;

        if !plain_component(branch) {
            return Err(RefUpdateError::BranchNotFound);
        }

        let path = self.heads_path(user, repo).join(branch);
        let tip = match fs::read_to_string(&path) {
            Ok(tip) => tip.trim().to_string(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RefUpdateError::BranchNotFound)
            }
            Err(err) => return Err(err.into()),
        };
        let current = (!tip.is_empty()).then_some(tip);

        match (expected, current.as_deref()) {
            (None, None) => {}
            (Some(expected), Some(current)) if expected == current => {}
            _ => {
                return Err(RefUpdateError::NonFastForward {
                    current_tip: current,
                })
            }
        }

        fs::write(&path, new_tip)?;
        Ok(new_tip.to_string())
    }

    /// Write the opaque object payloads that accompany a push.
    ///
    /// Contents are stored byte-for-byte; nothing is verified. Payloads for
    /// a push that later loses the ref race are harmless leftovers.
    ///
    /// # Errors
    /// Returns an error for invalid object ids or filesystem failures.
    pub fn store_objects(
        &self,
        user: &str,
        repo: &str,
        objects: &BTreeMap<String, String>,
    ) -> Result<(), std::io::Error> {
        if objects.is_empty() {
            return Ok(());
        }

        let dir = self.repo_path(user, repo).join(GITMINI_DIR).join("objects");
        fs::create_dir_all(&dir)?;
        for (id, content) in objects {
            if !plain_component(id) {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("invalid object id: {id}"),
                ));
            }
            fs::write(dir.join(id), content)?;
        }
        Ok(())
    }

    fn repo_path(&self, user: &str, repo: &str) -> PathBuf {
        self.root.join(user).join(repo)
    }

    fn heads_path(&self, user: &str, repo: &str) -> PathBuf {
        self.repo_path(user, repo)
            .join(GITMINI_DIR)
            .join("refs")
            .join("heads")
    }
}

/// A single path component: no separators, no traversal.
fn plain_component(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Validity check for repository names at provisioning time.
#[must_use]
pub fn valid_repo_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> RepoStore {
        RepoStore::new(dir.path().join("repos"))
    }

    #[test]
    fn init_creates_skeleton_with_empty_main() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.init_repo("gina", "repo1").unwrap());
        assert!(store.repo_exists("gina", "repo1"));
        assert!(store
            .root()
            .join("gina/repo1/.gitmini/objects")
            .is_dir());

        let branches = store.list_branches("gina", "repo1").unwrap();
        assert_eq!(branches.get("main").map(String::as_str), Some(""));

        // Second init is a no-op.
        assert!(!store.init_repo("gina", "repo1").unwrap());
    }

    #[test]
    fn init_rejects_traversal_names() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.init_repo("..", "repo1").is_err());
        assert!(store.init_repo("gina", "a/b").is_err());
        assert!(!store.repo_exists("..", "repo1"));
    }

    #[test]
    fn missing_repo_has_no_branches() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(!store.repo_exists("gina", "repo1"));
        assert!(store.list_branches("gina", "repo1").unwrap().is_empty());
        assert!(store.read_branch("gina", "repo1", "main").unwrap().is_none());
    }

    #[test]
    fn owner_among_finds_the_hosting_user() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_repo("maya", "repo1").unwrap();

        assert_eq!(
            store.owner_among(["gina", "maya"], "repo1"),
            Some("maya".to_string())
        );
        assert_eq!(store.owner_among(["gina"], "repo1"), None);
    }

    #[tokio::test]
    async fn first_push_needs_no_expectation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_repo("gina", "repo1").unwrap();

        let accepted = store
            .update_branch("gina", "repo1", "main", "c1", None)
            .await
            .unwrap();
        assert_eq!(accepted, "c1");
        assert_eq!(
            store.read_branch("gina", "repo1", "main").unwrap(),
            Some("c1".to_string())
        );
    }

    #[tokio::test]
    async fn push_to_unknown_branch_fails() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_repo("gina", "repo1").unwrap();

        assert!(matches!(
            store
                .update_branch("gina", "repo1", "feature", "c1", None)
                .await,
            Err(RefUpdateError::BranchNotFound)
        ));
        assert!(matches!(
            store
                .update_branch("gina", "repo1", "../escape", "c1", None)
                .await,
            Err(RefUpdateError::BranchNotFound)
        ));
    }

    #[tokio::test]
    async fn fast_forward_requires_the_current_tip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_repo("gina", "repo1").unwrap();
        store
            .update_branch("gina", "repo1", "main", "c1", None)
            .await
            .unwrap();

        // Matching expectation moves the tip.
        store
            .update_branch("gina", "repo1", "main", "c2", Some("c1"))
            .await
            .unwrap();

        // A stale expectation reports where the branch actually is.
        match store
            .update_branch("gina", "repo1", "main", "c3", Some("c1"))
            .await
        {
            Err(RefUpdateError::NonFastForward { current_tip }) => {
                assert_eq!(current_tip, Some("c2".to_string()));
            }
            other => panic!("expected non-fast-forward, got {other:?}"),
        }

        // Omitting the expectation against a moved branch is rejected too.
        assert!(matches!(
            store.update_branch("gina", "repo1", "main", "c3", None).await,
            Err(RefUpdateError::NonFastForward { .. })
        ));

        assert_eq!(
            store.read_branch("gina", "repo1", "main").unwrap(),
            Some("c2".to_string())
        );
    }

    #[tokio::test]
    async fn expectation_against_an_empty_branch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_repo("gina", "repo1").unwrap();

        match store
            .update_branch("gina", "repo1", "main", "c2", Some("c1"))
            .await
        {
            Err(RefUpdateError::NonFastForward { current_tip }) => {
                assert_eq!(current_tip, None);
            }
            other => panic!("expected non-fast-forward, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_pushes_have_exactly_one_winner() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store(&dir));
        store.init_repo("gina", "repo1").unwrap();
        store
            .update_branch("gina", "repo1", "main", "c1", None)
            .await
            .unwrap();

        let left = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .update_branch("gina", "repo1", "main", "l1", Some("c1"))
                    .await
            })
        };
        let right = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .update_branch("gina", "repo1", "main", "r1", Some("c1"))
                    .await
            })
        };

        let (left, right) = (left.await.unwrap(), right.await.unwrap());
        assert!(left.is_ok() != right.is_ok(), "exactly one push must win");

        let winner = if left.is_ok() { "l1" } else { "r1" };
        assert_eq!(
            store.read_branch("gina", "repo1", "main").unwrap(),
            Some(winner.to_string())
        );
    }

    #[test]
    fn objects_are_stored_verbatim() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_repo("gina", "repo1").unwrap();

        let mut objects = BTreeMap::new();
        objects.insert("c1".to_string(), "tree c0\nmessage\n".to_string());
        store.store_objects("gina", "repo1", &objects).unwrap();

        let stored = fs::read_to_string(
            store.root().join("gina/repo1/.gitmini/objects/c1"),
        )
        .unwrap();
        assert_eq!(stored, "tree c0\nmessage\n");

        let mut bad = BTreeMap::new();
        bad.insert("../escape".to_string(), "data".to_string());
        assert!(store.store_objects("gina", "repo1", &bad).is_err());
    }

    #[test]
    fn repo_names_validate_for_provisioning() {
        assert!(valid_repo_name("repo1"));
        assert!(valid_repo_name("my-repo_2.x"));
        assert!(!valid_repo_name(""));
        assert!(!valid_repo_name(".hidden"));
        assert!(!valid_repo_name("Repo"));
        assert!(!valid_repo_name("a/b"));
    }
}
