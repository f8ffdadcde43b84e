use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, header::HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};

/// Request headers browser clients (and the Supabase JS SDK) are allowed to send.
pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type, x-request-id";

pub fn allowed_headers() -> Vec<HeaderName> {
    ALLOW_HEADERS
        .split(',')
        .map(str::trim)
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect()
}

/// Body of every `OPTIONS` answer.
pub const PREFLIGHT_BODY: &str = "ok";

/// Allow-all policy shared by every public function endpoint.
///
/// Every `OPTIONS` request is answered by the layer itself, so handlers never
/// see preflights. Credentials are never allowed together with a wildcard
/// origin.
pub fn allow_all() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers())
        .allow_credentials(false)
}

/// Replaces the empty body of an `OPTIONS` answer with [`PREFLIGHT_BODY`],
/// keeping the CORS headers. Install outside [`allow_all`].
pub async fn preflight_body(req: Request, next: Next) -> Response {
    let is_options = req.method() == Method::OPTIONS;
    let resp = next.run(req).await;
    if !is_options || !resp.status().is_success() {
        return resp;
    }
    let (mut parts, _) = resp.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Response::from_parts(parts, Body::from(PREFLIGHT_BODY))
}
