//! Device session registry for the CLI login handshake.
//!
//! Flow Overview:
//! 1) `create` mints an opaque session token the CLI hands to the browser.
//! 2) The browser leg verifies the user; `complete` attaches the verified
//!    username and a freshly minted API key to the pending session.
//! 3) The CLI polls; `consume_if_complete` hands the credentials out exactly
//!    once and removes the session.
//!
//! Sessions live in memory only and expire after a short TTL. Expired
//! entries are pruned whenever the registry is touched; there is no
//! background sweeper.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::clock::Clock;

pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 10;
pub const DEFAULT_MAX_SESSIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Too many active sessions")]
    CapacityExceeded,
    #[error("Invalid CLI token")]
    NotFound,
    #[error("CLI token expired")]
    Expired,
    #[error("Authentication not completed")]
    NotReady,
}

struct DeviceSession {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    username: Option<String>,
    api_key: Option<SecretString>,
}

/// Outcome of `create`: the token the CLI shows the browser, plus its expiry.
#[derive(Debug)]
pub struct NewSession {
    pub cli_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Credentials handed to the CLI exactly once.
#[derive(Debug)]
pub struct CompletedSession {
    pub username: String,
    pub api_key: SecretString,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, DeviceSession>>,
    ttl: Duration,
    max_sessions: usize,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(ttl: Duration, max_sessions: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions,
            clock,
        }
    }

    /// Start a new login session.
    ///
    /// # Errors
    /// Returns `SessionError::CapacityExceeded` when the registry already
    /// holds `max_sessions` live sessions after pruning expired ones.
    pub async fn create(&self) -> Result<NewSession, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        prune_expired(&mut sessions, now);

        if sessions.len() >= self.max_sessions {
            return Err(SessionError::CapacityExceeded);
        }

        let cli_token = Uuid::new_v4().to_string();
        let expires_at = now + self.ttl;
        sessions.insert(
            cli_token.clone(),
            DeviceSession {
                created_at: now,
                expires_at,
                username: None,
                api_key: None,
            },
        );

        Ok(NewSession {
            cli_token,
            expires_at,
        })
    }

    /// Confirm that a token is known and has not expired.
    ///
    /// # Errors
    /// `NotFound` for unknown tokens, `Expired` for outlived ones; expired
    /// sessions are evicted by this read.
    pub async fn validate(&self, cli_token: &str) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;

        let session = sessions.remove(cli_token).ok_or(SessionError::NotFound)?;
        if session.expires_at < now {
            return Err(SessionError::Expired);
        }
        sessions.insert(cli_token.to_string(), session);
        Ok(())
    }

    /// Attach the verified username and raw API key to a pending session.
    ///
    /// Completing a session twice overwrites, last writer wins.
    ///
    /// # Errors
    /// `NotFound` for unknown or already-consumed tokens, `Expired` for
    /// outlived ones (evicting the session).
    pub async fn complete(
        &self,
        cli_token: &str,
        username: String,
        api_key: SecretString,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;

        let mut session = sessions.remove(cli_token).ok_or(SessionError::NotFound)?;
        if session.expires_at < now {
            return Err(SessionError::Expired);
        }

        session.username = Some(username);
        session.api_key = Some(api_key);
        sessions.insert(cli_token.to_string(), session);
        Ok(())
    }

    /// The one-shot credential read.
    ///
    /// On success the session is removed before the credentials are
    /// returned; a second consume of the same token reports `NotFound`. A
    /// pending session is left in place so polling can continue.
    ///
    /// # Errors
    /// `NotFound`, `Expired` (evicting) or `NotReady`.
    pub async fn consume_if_complete(
        &self,
        cli_token: &str,
    ) -> Result<CompletedSession, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;

        let session = sessions.remove(cli_token).ok_or(SessionError::NotFound)?;
        if session.expires_at < now {
            return Err(SessionError::Expired);
        }

        match (session.username, session.api_key) {
            (Some(username), Some(api_key)) => Ok(CompletedSession { username, api_key }),
            (username, api_key) => {
                sessions.insert(
                    cli_token.to_string(),
                    DeviceSession {
                        created_at: session.created_at,
                        expires_at: session.expires_at,
                        username,
                        api_key,
                    },
                );
                Err(SessionError::NotReady)
            }
        }
    }

    /// Number of live sessions, pruning expired ones on the way.
    pub async fn live_sessions(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        prune_expired(&mut sessions, now);
        sessions.len()
    }
}

fn prune_expired(sessions: &mut HashMap<String, DeviceSession>, now: DateTime<Utc>) {
    sessions.retain(|_, session| session.expires_at >= now);
}
