//! Instance hostname detection from incoming requests

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::AppState;

/// Hand a public request's `Host` to the domain manager before routing
pub async fn detect_hostname(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_owned);

    if let Some(host) = host {
        state.manager.detect_hostname(&host).await;
    }

    next.run(request).await
}
