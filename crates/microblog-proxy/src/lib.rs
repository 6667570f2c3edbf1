//! Reverse-proxy route management
//!
//! Thin client over a reverse proxy's admin HTTP API (Caddy's JSON admin
//! API). Custom domains are served by installing one named route per domain
//! that forwards matching hosts to this service's internal address.

pub mod caddy;
pub mod route;

pub use caddy::{CaddyAdminClient, CaddyAdminConfig};
pub use route::{route_id, RouteConfig};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by the reverse-proxy admin API client
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to call reverse proxy API: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reverse proxy API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Reverse proxy admin API is not reachable")]
    Unavailable,
}

/// Route operations the domain workflow needs from a reverse proxy
#[async_trait]
pub trait RouteClient: Send + Sync {
    /// Install a route sending traffic for `domain` to the upstream
    async fn add_route(&self, domain: &str) -> Result<(), ProxyError>;

    /// Remove the route for `domain`; a missing route is not an error
    async fn remove_route(&self, domain: &str) -> Result<(), ProxyError>;

    /// Check whether the admin API answers
    async fn is_available(&self) -> bool;
}

/// Poll `client` until it answers, up to `attempts` checks spaced by `delay`
///
/// Returns `true` as soon as one check succeeds.
pub async fn wait_until_available(
    client: &dyn RouteClient,
    attempts: u32,
    delay: Duration,
) -> bool {
    for attempt in 1..=attempts {
        if client.is_available().await {
            debug!("Reverse proxy reachable after {} check(s)", attempt);
            return true;
        }
        if attempt < attempts {
            info!(
                "Waiting for reverse proxy admin API (attempt {}/{})...",
                attempt, attempts
            );
            tokio::time::sleep(delay).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProxy {
        checks: AtomicU32,
        up_after: u32,
    }

    #[async_trait]
    impl RouteClient for FlakyProxy {
        async fn add_route(&self, _domain: &str) -> Result<(), ProxyError> {
            Ok(())
        }

        async fn remove_route(&self, _domain: &str) -> Result<(), ProxyError> {
            Ok(())
        }

        async fn is_available(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.up_after
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_available_retries_until_up() {
        let proxy = FlakyProxy {
            checks: AtomicU32::new(0),
            up_after: 3,
        };

        assert!(wait_until_available(&proxy, 5, Duration::from_secs(2)).await);
        assert_eq!(proxy.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_available_gives_up() {
        let proxy = FlakyProxy {
            checks: AtomicU32::new(0),
            up_after: u32::MAX,
        };

        assert!(!wait_until_available(&proxy, 5, Duration::from_secs(2)).await);
        assert_eq!(proxy.checks.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_api_error_surfaces_status_and_body() {
        let err = ProxyError::Api {
            status: 400,
            body: "bad route".to_string(),
        };
        assert_eq!(err.to_string(), "Reverse proxy API error (400): bad route");
    }
}
