//! Response policy headers and the `Host` allow-list.

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const POLICY_HEADERS: [(HeaderName, &str); 7] = [
    (header::X_FRAME_OPTIONS, "DENY"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'self'; connect-src *; font-src *; script-src-elem * 'unsafe-inline'; img-src * data:; style-src * 'unsafe-inline';",
    ),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains; preload",
    ),
    (header::REFERRER_POLICY, "strict-origin"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (
        HeaderName::from_static("permissions-policy"),
        "geolocation=(),midi=(),sync-xhr=(),microphone=(),camera=(),magnetometer=(),gyroscope=(),fullscreen=(self),payment=()",
    ),
];

/// Attach the browser hardening headers to every response.
pub async fn policy_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in POLICY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

/// Host names the service answers to. Empty means any.
#[derive(Clone, Debug, Default)]
pub struct AllowedHosts(Vec<String>);

impl AllowedHosts {
    #[must_use]
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        Self(
            hosts
                .into_iter()
                .map(|host| host.trim().to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
        )
    }

    #[must_use]
    pub fn permits(&self, host: Option<&str>) -> bool {
        if self.0.is_empty() {
            return true;
        }
        host.is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            self.0.iter().any(|allowed| *allowed == host)
        })
    }
}

/// Reject requests whose `Host` header is not on the allow-list.
pub async fn allowed_hosts(
    State(allowed): State<Arc<AllowedHosts>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    if !allowed.permits(host) {
        debug!(host = host.unwrap_or("none"), "host not allowed");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid host header"})),
        )
            .into_response();
    }
    next.run(request).await
}
