pub mod cli_auth;
pub mod health;
pub mod remote;

pub use self::health::health;

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Client origin for rate limiting: proxy headers first, then the socket
/// peer, `"unknown"` when neither is available.
pub(crate) fn client_origin(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if let Some(ip) = real_ip {
        return ip;
    }

    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}
