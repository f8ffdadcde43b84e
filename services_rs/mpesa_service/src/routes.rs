use axum::extract::MatchedPath;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use urbango_common::cors;
use urbango_common::request_id::{propagate_request_id, RequestId};

use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/mpesa-stk-push", post(handlers::stk_push))
        .route("/mpesa-stk-callback", post(handlers::stk_callback))
        .route("/simulate-trip-flow", post(handlers::simulate_trip))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state)
        // Answers every OPTIONS request itself, including preflights.
        .layer(cors::allow_all())
        .layer(middleware::from_fn(cors::preflight_body))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        // Logs the matched route template, never the query string.
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or_else(|| req.uri().path());
                let request_id = req
                    .extensions()
                    .get::<RequestId>()
                    .map(RequestId::as_str)
                    .unwrap_or("-");
                tracing::span!(
                    tracing::Level::INFO,
                    "http_request",
                    method = %req.method(),
                    path = %path,
                    request_id = %request_id
                )
            }),
        )
        .layer(middleware::from_fn(propagate_request_id))
}
