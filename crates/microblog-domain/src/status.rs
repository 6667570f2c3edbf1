//! Snapshot of the custom domain state for display

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// DNS records the operator has to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsInstructions {
    pub txt_name: String,
    pub txt_value: String,
    pub cname_name: String,
    /// Unknown until the instance hostname is set
    pub cname_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainStatus {
    pub configured: bool,
    pub custom_domains_enabled: bool,
    pub instance_hostname: Option<String>,
    pub domain: Option<String>,
    pub verified: bool,
    pub activated: bool,
    /// Lifetime verification attempts
    pub attempts: u32,
    /// Attempts left in the current rate-limit window
    pub attempts_left: u32,
    pub verified_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub dns: Option<DnsInstructions>,
}
