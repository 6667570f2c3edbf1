use chrono::{DateTime, Utc};
use microblog_domain::{DnsInstructions, DomainStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to register a custom domain
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddDomainRequest {
    /// Domain name, e.g. "blog.example-user.com"
    pub domain: String,
}

/// DNS records to publish for the custom domain
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecordsResponse {
    /// Name of the ownership TXT record
    pub txt_name: String,
    /// Value the TXT record must hold
    pub txt_value: String,
    /// Name of the CNAME record (the custom domain itself)
    pub cname_name: String,
    /// CNAME target; unset until the instance hostname is known
    pub cname_target: Option<String>,
}

impl From<DnsInstructions> for DnsRecordsResponse {
    fn from(dns: DnsInstructions) -> Self {
        Self {
            txt_name: dns.txt_name,
            txt_value: dns.txt_value,
            cname_name: dns.cname_name,
            cname_target: dns.cname_target,
        }
    }
}

/// Custom domain status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainStatusResponse {
    /// Whether a custom domain is registered
    pub configured: bool,
    /// Whether this instance may use custom domains at all
    pub custom_domains_enabled: bool,
    pub instance_hostname: Option<String>,
    pub domain: Option<String>,
    pub verified: bool,
    pub activated: bool,
    /// Verification attempts made so far
    pub attempts: u32,
    /// Verification attempts left in the current hour
    pub attempts_left: u32,
    pub verified_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub dns: Option<DnsRecordsResponse>,
    /// Set when verification passed but automatic activation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_error: Option<String>,
}

impl From<DomainStatus> for DomainStatusResponse {
    fn from(status: DomainStatus) -> Self {
        Self {
            configured: status.configured,
            custom_domains_enabled: status.custom_domains_enabled,
            instance_hostname: status.instance_hostname,
            domain: status.domain,
            verified: status.verified,
            activated: status.activated,
            attempts: status.attempts,
            attempts_left: status.attempts_left,
            verified_at: status.verified_at,
            activated_at: status.activated_at,
            last_verified_at: status.last_verified_at,
            dns: status.dns.map(Into::into),
            activation_error: None,
        }
    }
}

/// Result of enabling custom domains for this instance
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnableResponse {
    /// Hostname custom domains must CNAME to
    pub instance_hostname: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
        }
    }
}
