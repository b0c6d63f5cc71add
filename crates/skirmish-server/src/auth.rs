use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Admin route authentication.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Bearer token for admin routes. None = auth disabled.
    pub bearer_token: Option<String>,
}

impl AuthConfig {
    /// True when the `authorization` header carries the configured token, or
    /// when no token is configured.
    pub fn permits(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.bearer_token else {
            return true;
        };
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected)
    }
}

/// Axum middleware that validates Bearer token authentication.
/// If no token is configured (`AuthConfig::bearer_token` is None), all
/// requests are allowed through (auth disabled).
pub async fn bearer_auth_middleware(
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if !auth_config.permits(&headers) {
        tracing::debug!(uri = %request.uri(), "admin request rejected");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
