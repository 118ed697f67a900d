//! # minihub (gitmini remote hub)
//!
//! `minihub` is the server side of the `gitmini` version-control tool. The
//! CLI talks to it over HTTP+JSON for two things:
//!
//! 1. **CLI authentication**: a device-authorization handshake. The CLI
//!    requests a short-lived session token, the user confirms their identity
//!    in the browser, and the CLI polls until it can collect a freshly minted
//!    API key. The raw key is revealed exactly once.
//! 2. **Remote operations**: `remote add` (connect to a hosted repository
//!    and list its branches) and `push` (replace a branch tip, admitted only
//!    when the update is fast-forward), authenticated with that API key.
//!
//! ## Storage model
//!
//! - **In memory:** device sessions and failed-attempt counters. Each
//!   registry is the sole owner of its table, guarded by one async mutex,
//!   and prunes expired entries whenever it is touched.
//! - **On disk:** a JSON credential snapshot (`users.json`, argon2 password
//!   hashes and SHA-256 API key digests) and one directory per hosted
//!   repository (`repos/<user>/<repo>/.gitmini/`) holding branch refs and
//!   opaque object payloads.
//!
//! ## Admission rules
//!
//! - Usernames are normalized (lowercase, whitespace stripped) before every
//!   lookup.
//! - Failed browser-leg verifications are rate limited per client origin;
//!   API-key pushes never count against that budget.
//! - A push must name the remote tip it built on; the ref only moves when
//!   the expectation matches (compare-and-swap under a store-wide lock).

pub mod api;
pub mod auth;
pub mod cli;
pub mod repos;
pub mod users;
