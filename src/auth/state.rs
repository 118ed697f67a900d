//! Shared auth state and its tunables, injected into handlers as an
//! extension.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{
    clock::Clock,
    rate_limit::{DEFAULT_FAILURE_WINDOW_MINUTES, DEFAULT_MAX_FAILURES, FailedLoginLimiter},
    sessions::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL_MINUTES, SessionRegistry},
};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    session_ttl_minutes: i64,
    max_sessions: usize,
    max_failed_attempts: u32,
    failed_window_minutes: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_failed_attempts: DEFAULT_MAX_FAILURES,
            failed_window_minutes: DEFAULT_FAILURE_WINDOW_MINUTES,
        }
    }

    #[must_use]
    pub fn with_session_ttl_minutes(mut self, minutes: i64) -> Self {
        self.session_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    #[must_use]
    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self
    }

    #[must_use]
    pub fn with_failed_window_minutes(mut self, minutes: i64) -> Self {
        self.failed_window_minutes = minutes;
        self
    }

    /// Prefix for the browser login URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: SessionRegistry,
    limiter: FailedLoginLimiter,
    store_write: Mutex<()>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let sessions = SessionRegistry::new(
            Duration::minutes(config.session_ttl_minutes),
            config.max_sessions,
            Arc::clone(&clock),
        );
        let limiter = FailedLoginLimiter::new(
            config.max_failed_attempts,
            Duration::minutes(config.failed_window_minutes),
            clock,
        );

        Self {
            config,
            sessions,
            limiter,
            store_write: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[must_use]
    pub fn limiter(&self) -> &FailedLoginLimiter {
        &self.limiter
    }

    /// Serializes read-modify-write cycles on the credential store.
    #[must_use]
    pub fn store_write(&self) -> &Mutex<()> {
        &self.store_write
    }
}
