//! CLI authentication domain: device sessions, failure limits, keys and
//! passwords, plus the shared state handlers receive as an extension.

pub mod clock;
pub mod keys;
pub mod password;
pub mod rate_limit;
pub mod sessions;
pub mod state;
