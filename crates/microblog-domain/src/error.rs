//! Error types for the custom domain workflow

use microblog_proxy::ProxyError;
use thiserror::Error;

use crate::dns::DnsVerificationError;
use crate::store::StoreError;
use crate::validation::DomainValidationError;

/// Errors returned by [`crate::DomainManager`] operations
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] DomainValidationError),

    #[error("A custom domain is already configured; remove it first")]
    AlreadyConfigured,

    #[error("No custom domain configured")]
    NotConfigured,

    #[error("Domain must be verified before activation")]
    NotVerified,

    #[error("Domain is already active")]
    AlreadyActivated,

    #[error("Too many verification attempts; please wait an hour")]
    RateLimited,

    #[error("DNS verification failed: {0}")]
    Dns(#[from] DnsVerificationError),

    #[error("Reverse proxy update failed: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Custom domains are not enabled for this instance")]
    CustomDomainsDisabled,

    #[error("Custom domains already enabled for {0}")]
    AlreadyEnabled(String),

    #[error("Could not detect hostname")]
    HostnameMissing,

    #[error("Custom domains are only available for managed subdomains, not '{0}'")]
    NotManagedHost(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
