//! Custom domain workflow configuration

use std::time::Duration;

/// Settings for custom domain registration, verification and upkeep
#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// Brand used in the verification record name (`_<brand>-verify.<domain>`)
    pub brand: String,
    /// Prefix identifying verification tokens
    pub token_prefix: String,
    /// Parent domains of managed instances; only their subdomains may enable
    /// custom domains, and they can never be registered as one
    pub managed_domains: Vec<String>,
    /// Other names that may not appear in a custom domain
    pub reserved_names: Vec<String>,
    /// Verification attempts allowed per domain within `verify_window`
    pub max_verify_attempts: u32,
    pub verify_window: Duration,
    /// Period of the background DNS re-check of the active domain
    pub revalidation_interval: Duration,
    /// Reverse-proxy availability checks before giving up at startup
    pub proxy_check_attempts: u32,
    pub proxy_check_delay: Duration,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            brand: "microblog".to_string(),
            token_prefix: "mblg_".to_string(),
            managed_domains: vec!["microblog.host".to_string()],
            reserved_names: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "0.0.0.0".to_string(),
                "example.com".to_string(),
                "example.org".to_string(),
            ],
            max_verify_attempts: 5,
            verify_window: Duration::from_secs(60 * 60),
            revalidation_interval: Duration::from_secs(7 * 24 * 60 * 60),
            proxy_check_attempts: 5,
            proxy_check_delay: Duration::from_secs(2),
        }
    }
}

impl DomainConfig {
    /// Name of the TXT record proving ownership of `domain`
    pub fn txt_record_name(&self, domain: &str) -> String {
        format!("_{}-verify.{}", self.brand, domain)
    }

    /// Every name a custom domain must not contain
    pub fn blocked_names(&self) -> impl Iterator<Item = &str> {
        self.managed_domains
            .iter()
            .chain(self.reserved_names.iter())
            .map(String::as_str)
    }
}
