/// Request middleware and header helpers
use crate::{context::AppContext, error::DeskError};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Address a rate limit is keyed on.
///
/// `X-Forwarded-For` is only believed when the socket peer is a trusted
/// proxy. Requests with no known peer share one bucket.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> IpAddr {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };

    if !trusted.contains(&peer) {
        return peer;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(peer)
}

fn request_ip(ctx: &AppContext, req: &Request) -> IpAddr {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(req.headers(), peer, &ctx.config.rate_limit.trusted_proxies)
}

/// Apply the general per-client quota
pub async fn general_rate_limit(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Result<Response, DeskError> {
    ctx.rate_limiter.check_general(request_ip(&ctx, &req))?;

    Ok(next.run(req).await)
}

/// Apply the challenge-start quota; these requests send mail
pub async fn challenge_rate_limit(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Result<Response, DeskError> {
    ctx.rate_limiter.check_challenge(request_ip(&ctx, &req))?;

    Ok(next.run(req).await)
}
