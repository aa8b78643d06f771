use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{adapters::http::app_state::AppState, app_error::AppError};

/// Rate limits every request by caller IP and, when the wizard left an
/// email cookie behind, by email as well.
pub async fn rate_limit_middleware(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request, addr, app_state.config.trust_proxy);
    let email = cookies.get("user_email").map(|c| c.value().to_owned());

    app_state.rate_limiter.check(&ip, email.as_deref()).await?;

    // Keep the jar available to downstream extractors.
    request.extensions_mut().insert(cookies);

    Ok(next.run(request).await)
}

/// The peer address, unless a reverse proxy is explicitly trusted to report
/// the real client. Forwarded headers from an untrusted edge would let
/// callers reset their own limits.
fn client_ip(request: &Request, addr: SocketAddr, trust_proxy: bool) -> String {
    if !trust_proxy {
        return addr.ip().to_string();
    }

    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| request.headers().get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string())
}
