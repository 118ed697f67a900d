use std::path::PathBuf;

pub mod repo_init;
pub mod server;
pub mod user_add;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        data_dir: PathBuf,
        base_url: String,
        session_ttl: i64,
        max_sessions: usize,
        max_failed_attempts: u32,
        failed_window: i64,
    },
    UserAdd {
        data_dir: PathBuf,
        username: String,
        password: String,
    },
    RepoInit {
        data_dir: PathBuf,
        username: String,
        repo: String,
    },
}
