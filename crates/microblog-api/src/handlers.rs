use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use microblog_domain::{DomainError, ProxyError};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::models::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a workflow error to its HTTP status and error code
pub fn domain_error(err: DomainError) -> ApiError {
    let (status, code) = match &err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_DOMAIN"),
        DomainError::AlreadyConfigured => (StatusCode::CONFLICT, "DOMAIN_EXISTS"),
        DomainError::NotConfigured => (StatusCode::NOT_FOUND, "DOMAIN_NOT_FOUND"),
        DomainError::NotVerified => (StatusCode::CONFLICT, "DOMAIN_NOT_VERIFIED"),
        DomainError::AlreadyActivated => (StatusCode::CONFLICT, "DOMAIN_ALREADY_ACTIVE"),
        DomainError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        DomainError::Dns(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DNS_VERIFICATION_FAILED"),
        DomainError::Proxy(ProxyError::Unavailable) => {
            (StatusCode::SERVICE_UNAVAILABLE, "PROXY_UNAVAILABLE")
        }
        DomainError::Proxy(_) => (StatusCode::BAD_GATEWAY, "PROXY_ERROR"),
        DomainError::CustomDomainsDisabled => (StatusCode::FORBIDDEN, "CUSTOM_DOMAINS_DISABLED"),
        DomainError::AlreadyEnabled(_) => (StatusCode::CONFLICT, "ALREADY_ENABLED"),
        DomainError::HostnameMissing => (StatusCode::BAD_REQUEST, "HOSTNAME_MISSING"),
        DomainError::NotManagedHost(_) => (StatusCode::FORBIDDEN, "NOT_MANAGED_HOST"),
        DomainError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    };

    if status.is_server_error() {
        error!("Custom domain request failed: {}", err);
    }

    (status, Json(ErrorResponse::new(err.to_string(), code)))
}

async fn current_status(state: &AppState) -> Result<DomainStatusResponse, ApiError> {
    let status = state.manager.status().await.map_err(domain_error)?;
    Ok(status.into())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get the custom domain status
#[utoipa::path(
    get,
    path = "/api/domain",
    responses(
        (status = 200, description = "Custom domain status", body = DomainStatusResponse),
        (status = 401, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "domains"
)]
pub async fn get_domain_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DomainStatusResponse>, ApiError> {
    debug!("Getting custom domain status");
    Ok(Json(current_status(&state).await?))
}

/// Register a custom domain
#[utoipa::path(
    post,
    path = "/api/domain",
    request_body = AddDomainRequest,
    responses(
        (status = 201, description = "Domain registered; publish the DNS records next", body = DomainStatusResponse),
        (status = 400, description = "Invalid domain", body = ErrorResponse),
        (status = 403, description = "Custom domains are not enabled", body = ErrorResponse),
        (status = 409, description = "A custom domain is already configured", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "domains"
)]
pub async fn add_domain(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddDomainRequest>,
) -> Result<(StatusCode, Json<DomainStatusResponse>), ApiError> {
    info!("Registering custom domain: {}", req.domain);

    state
        .manager
        .register(&req.domain)
        .await
        .map_err(domain_error)?;

    Ok((StatusCode::CREATED, Json(current_status(&state).await?)))
}

/// Verify the DNS records and activate the domain when they pass
#[utoipa::path(
    post,
    path = "/api/domain/verify",
    responses(
        (status = 200, description = "Domain verified; check activationError for the activation result", body = DomainStatusResponse),
        (status = 404, description = "No custom domain configured", body = ErrorResponse),
        (status = 422, description = "DNS verification failed", body = ErrorResponse),
        (status = 429, description = "Too many verification attempts", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "domains"
)]
pub async fn verify_domain(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DomainStatusResponse>, ApiError> {
    let outcome = state
        .manager
        .verify_and_activate()
        .await
        .map_err(domain_error)?;

    let mut status = current_status(&state).await?;
    status.activation_error = outcome.activation_error;
    Ok(Json(status))
}

/// Activate a verified domain
#[utoipa::path(
    post,
    path = "/api/domain/activate",
    responses(
        (status = 200, description = "Domain activated", body = DomainStatusResponse),
        (status = 404, description = "No custom domain configured", body = ErrorResponse),
        (status = 409, description = "Domain not verified or already active", body = ErrorResponse),
        (status = 422, description = "DNS records no longer match", body = ErrorResponse),
        (status = 502, description = "Reverse proxy rejected the route", body = ErrorResponse),
        (status = 503, description = "Reverse proxy unavailable", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "domains"
)]
pub async fn activate_domain(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DomainStatusResponse>, ApiError> {
    state.manager.activate().await.map_err(domain_error)?;
    Ok(Json(current_status(&state).await?))
}

/// Remove the custom domain
#[utoipa::path(
    delete,
    path = "/api/domain",
    responses(
        (status = 204, description = "Domain removed"),
        (status = 404, description = "No custom domain configured", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "domains"
)]
pub async fn remove_domain(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.manager.remove().await.map_err(domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Enable custom domains using the hostname of this request
#[utoipa::path(
    post,
    path = "/api/domain/enable",
    responses(
        (status = 200, description = "Custom domains enabled", body = EnableResponse),
        (status = 400, description = "No Host header", body = ErrorResponse),
        (status = 403, description = "Host is not a managed subdomain", body = ErrorResponse),
        (status = 409, description = "Custom domains already enabled", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "domains"
)]
pub async fn enable_custom_domains(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<EnableResponse>, ApiError> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let instance_hostname = state
        .manager
        .enable_for_host(host)
        .await
        .map_err(domain_error)?;

    Ok(Json(EnableResponse { instance_hostname }))
}
