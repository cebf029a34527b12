//! Reverse proxy awareness
//!
//! Behind a TLS-terminating proxy the scheme and host the client used are only
//! visible through `X-Forwarded-Proto` and `X-Forwarded-Host`. One proxy hop
//! is trusted: only the first value of each header is used.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts, HeaderMap},
};

const FORWARDED_PROTO: &str = "X-Forwarded-Proto";
const FORWARDED_HOST: &str = "X-Forwarded-Host";

/// Scheme and authority the client used to reach the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBase {
    pub scheme: String,
    pub host: String,
}

impl ExternalBase {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let scheme = first_value(headers, FORWARDED_PROTO)
            .map(|s| s.to_ascii_lowercase())
            .filter(|s| s == "http" || s == "https")
            .unwrap_or_else(|| "http".to_string());

        let host = first_value(headers, FORWARDED_HOST)
            .or_else(|| first_value(headers, HOST.as_str()))
            .unwrap_or_else(|| "localhost".to_string());

        Self { scheme, host }
    }

    /// Absolute URL for a path on this service
    pub fn url_for(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path)
    }
}

impl<S> FromRequestParts<S> for ExternalBase
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
