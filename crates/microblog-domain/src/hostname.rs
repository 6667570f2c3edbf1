//! Instance hostname handling
//!
//! Custom domains CNAME to the instance hostname, and only instances served
//! from a managed parent domain may enable the feature at all.

use std::net::IpAddr;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::store::DomainStore;
use crate::DomainError;

/// Extract the hostname from a `Host` header value (port stripped, lowercased)
pub fn host_from_header(value: &str) -> String {
    let value = value.trim();

    // Bracketed IPv6 literal, e.g. "[::1]:8080"
    if let Some(rest) = value.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, _)) => addr.to_ascii_lowercase(),
            None => rest.to_ascii_lowercase(),
        };
    }

    let host = match value.rsplit_once(':') {
        // Unbracketed IPv6 literals contain several colons and carry no port
        Some((host, port)) if !host.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            host
        }
        _ => value,
    };
    host.trim().to_ascii_lowercase()
}

/// Whether `host` is a subdomain of one of the managed parent domains
pub fn is_managed_subdomain(host: &str, managed_domains: &[String]) -> bool {
    let host = host.trim().to_ascii_lowercase();
    managed_domains.iter().any(|parent| {
        let parent = parent.trim().trim_start_matches('.').to_ascii_lowercase();
        !parent.is_empty() && host.ends_with(&format!(".{}", parent))
    })
}

pub(crate) fn is_ip_literal(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// Store `host` as the instance hostname, refusing to replace an existing one
///
/// Returns the normalized hostname.
pub async fn enable_instance_hostname(
    store: &dyn DomainStore,
    managed_domains: &[String],
    host: &str,
) -> Result<String, DomainError> {
    if let Some(existing) = store.instance_hostname().await? {
        return Err(DomainError::AlreadyEnabled(existing));
    }

    let host = host_from_header(host);
    if host.is_empty() {
        return Err(DomainError::HostnameMissing);
    }
    if !is_managed_subdomain(&host, managed_domains) {
        return Err(DomainError::NotManagedHost(host));
    }

    store.set_instance_hostname(&host).await?;
    info!("Custom domains enabled for: {}", host);
    Ok(host)
}

/// One-shot detection of the instance hostname from the first request seen
#[derive(Default)]
pub struct HostnameDetector {
    observed: OnceCell<()>,
}

impl HostnameDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a request's `Host` header; only the first call does any work
    ///
    /// The hostname is stored only when none is set yet and the request came
    /// in through a managed subdomain.
    pub async fn observe(&self, store: &dyn DomainStore, managed_domains: &[String], host_header: &str) {
        self.observed
            .get_or_init(|| async {
                detect(store, managed_domains, host_header).await;
            })
            .await;
    }

    pub fn has_observed(&self) -> bool {
        self.observed.initialized()
    }
}

async fn detect(store: &dyn DomainStore, managed_domains: &[String], host_header: &str) {
    match store.instance_hostname().await {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            warn!("Failed to read instance hostname: {}", e);
            return;
        }
    }

    let host = host_from_header(host_header);
    if host.is_empty() || host == "localhost" || is_ip_literal(&host) {
        return;
    }
    if !is_managed_subdomain(&host, managed_domains) {
        return;
    }

    match store.set_instance_hostname(&host).await {
        Ok(()) => info!("Detected managed hostname {} (custom domains enabled)", host),
        Err(e) => warn!("Failed to store hostname: {}", e),
    }
}
