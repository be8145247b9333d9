use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use service_core::middleware::rate_limit::client_ip;
use std::convert::Infallible;

const UNKNOWN: &str = "unknown";

/// Caller metadata recorded on sessions, tokens and audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    /// IP from `x-forwarded-for` then `x-real-ip`; user agent from the
    /// header. Either falls back to `"unknown"`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = client_ip(headers, None)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();

        Self {
            ip_address,
            user_agent,
        }
    }

    pub fn unknown() -> Self {
        Self {
            ip_address: UNKNOWN.to_string(),
            user_agent: UNKNOWN.to_string(),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_headers(&parts.headers))
    }
}
