use axum::{extract::ConnectInfo, http::HeaderMap, http::Extensions};
use std::net::{IpAddr, SocketAddr};

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// First hop of `X-Forwarded-For`, if it parses as an IP address.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Best-effort origin address: forwarding header first, then the socket peer.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    forwarded_ip(headers).or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}
