use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_INBOUND_LEN: usize = 128;

/// Correlation id of the current request, available as a request extension.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn inbound_id(req: &Request) -> Option<String> {
    let raw = req.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    if raw.is_empty() || raw.len() > MAX_INBOUND_LEN {
        return None;
    }
    if !raw.chars().all(|c| c.is_ascii_graphic()) {
        return None;
    }
    Some(raw.to_string())
}

/// Reuses a sane caller-supplied `x-request-id` or mints one, stores it in the
/// request extensions and echoes it on the response.
///
/// Install with `axum::middleware::from_fn(propagate_request_id)` as the
/// outermost layer so tracing spans can read the extension.
pub async fn propagate_request_id(mut req: Request, next: Next) -> Response {
    let rid = inbound_id(&req).unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    req.extensions_mut().insert(RequestId(rid.clone()));

    let mut resp = next.run(req).await;
    if !resp.headers().contains_key(REQUEST_ID_HEADER) {
        if let Ok(v) = HeaderValue::from_str(&rid) {
            resp.headers_mut().insert(REQUEST_ID_HEADER, v);
        }
    }
    resp
}
