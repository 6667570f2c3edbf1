//! Caddy admin API client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use crate::route::{route_id, RouteConfig};
use crate::{ProxyError, RouteClient};

/// Caddy admin API configuration
#[derive(Debug, Clone)]
pub struct CaddyAdminConfig {
    /// Admin API base URL, e.g. `http://caddy:2019`
    pub api_url: String,
    /// Path of the routes array new routes are appended to
    pub routes_path: String,
    /// Address Caddy dials to reach this service
    pub upstream_dial: String,
    /// Timeout for route mutations
    pub request_timeout: Duration,
    /// Timeout for the availability check
    pub check_timeout: Duration,
}

impl Default for CaddyAdminConfig {
    fn default() -> Self {
        Self {
            api_url: "http://caddy:2019".to_string(),
            routes_path: "/config/apps/http/servers/srv0/routes".to_string(),
            upstream_dial: "blog:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            check_timeout: Duration::from_secs(2),
        }
    }
}

/// HTTP client for Caddy's JSON admin API
#[derive(Debug, Clone)]
pub struct CaddyAdminClient {
    config: CaddyAdminConfig,
    http: Client,
}

impl CaddyAdminClient {
    /// Create a new client from the given configuration
    pub fn new(config: CaddyAdminConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }
}

async fn api_error(response: reqwest::Response) -> ProxyError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProxyError::Api { status, body }
}

#[async_trait]
impl RouteClient for CaddyAdminClient {
    async fn add_route(&self, domain: &str) -> Result<(), ProxyError> {
        let route = RouteConfig::reverse_proxy(domain, &self.config.upstream_dial);

        // POST appends to the routes array; the @id makes DELETE /id/{id} work later
        let response = self
            .http
            .post(self.url(&self.config.routes_path))
            .timeout(self.config.request_timeout)
            .json(&route)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        info!("Added reverse proxy route for custom domain {}", domain);
        Ok(())
    }

    async fn remove_route(&self, domain: &str) -> Result<(), ProxyError> {
        let id = route_id(domain);
        let response = self
            .http
            .delete(self.url(&format!("/id/{}", id)))
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Route {} was not installed", id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        info!("Removed reverse proxy route for custom domain {}", domain);
        Ok(())
    }

    async fn is_available(&self) -> bool {
        match self
            .http
            .get(self.url("/config/"))
            .timeout(self.config.check_timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Reverse proxy check failed: {}", e);
                false
            }
        }
    }
}
