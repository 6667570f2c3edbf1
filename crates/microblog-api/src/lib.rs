pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use microblog_domain::DomainManager;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers
pub struct AppState {
    pub manager: Arc<DomainManager>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Microblog API",
        version = "0.1.0",
        description = "Custom domain management for a microblog instance",
        contact(
            name = "Microblog Team",
            email = "team@microblog.dev"
        )
    ),
    paths(
        handlers::health_check,
        handlers::get_domain_status,
        handlers::add_domain,
        handlers::verify_domain,
        handlers::activate_domain,
        handlers::remove_domain,
        handlers::enable_custom_domains,
    ),
    components(
        schemas(
            models::AddDomainRequest,
            models::DnsRecordsResponse,
            models::DomainStatusResponse,
            models::EnableResponse,
            models::HealthResponse,
            models::ErrorResponse,
        )
    ),
    modifiers(&AdminTokenAddon),
    tags(
        (name = "domains", description = "Custom domain management endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

struct AdminTokenAddon;

impl Modify for AdminTokenAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Bearer token required on every `/api/*` route
    pub admin_token: String,
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, manager: Arc<DomainManager>) -> Self {
        Self {
            config,
            state: Arc::new(AppState { manager }),
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();
        let admin_token = Arc::new(middleware::AdminToken::new(&self.config.admin_token));

        // Build PUBLIC routes (no authentication required)
        // Only public traffic feeds hostname detection; admin calls never do
        let public_router = Router::new()
            .route("/health", get(handlers::health_check))
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                middleware::detect_hostname,
            ));

        // Build ADMIN routes (require the admin bearer token)
        let admin_router = Router::new()
            .route(
                "/api/domain",
                get(handlers::get_domain_status)
                    .post(handlers::add_domain)
                    .delete(handlers::remove_domain),
            )
            .route("/api/domain/verify", post(handlers::verify_domain))
            .route("/api/domain/activate", post(handlers::activate_domain))
            .route("/api/domain/enable", post(handlers::enable_custom_domains))
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                admin_token,
                middleware::require_admin,
            ));

        // SwaggerUi serves /api/openapi.json itself
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(public_router)
            .merge(admin_router)
            .layer(TraceLayer::new_for_http())
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI document: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
