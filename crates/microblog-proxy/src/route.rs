//! JSON route objects understood by the Caddy admin API

use serde::{Deserialize, Serialize};

const ROUTE_ID_PREFIX: &str = "custom-domain-";

/// Deterministic route identifier for a custom domain
///
/// Registered as the route's `@id` so it can later be removed with
/// `DELETE /id/<id>`.
pub fn route_id(domain: &str) -> String {
    format!("{}{}", ROUTE_ID_PREFIX, domain)
}

/// A host-matched reverse-proxy route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "match")]
    pub matchers: Vec<HostMatch>,
    pub handle: Vec<Handler>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMatch {
    pub host: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    pub handler: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstreams: Vec<Upstream>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    pub dial: String,
}

impl RouteConfig {
    /// Route forwarding every request for `domain` to `upstream_dial`
    pub fn reverse_proxy(domain: &str, upstream_dial: &str) -> Self {
        Self {
            id: route_id(domain),
            matchers: vec![HostMatch {
                host: vec![domain.to_string()],
            }],
            handle: vec![Handler {
                handler: "reverse_proxy".to_string(),
                upstreams: vec![Upstream {
                    dial: upstream_dial.to_string(),
                }],
            }],
        }
    }
}
