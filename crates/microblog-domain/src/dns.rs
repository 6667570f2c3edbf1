//! DNS ownership verification
//!
//! A custom domain is proven to belong to the operator when both records
//! exist:
//! - `TXT _<brand>-verify.<domain>` containing the stored verification token
//! - `CNAME <domain>` pointing at this instance's hostname, directly or
//!   through further CNAMEs

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single DNS lookup
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("no records found")]
    NoRecords,

    #[error("resolver error: {0}")]
    Resolver(String),
}

/// Why a domain failed DNS verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsVerificationError {
    #[error("TXT record not found: please add a TXT record for {name}")]
    TxtRecordMissing { name: String },

    #[error("Verification token mismatch: the TXT record at {name} does not match")]
    TokenMismatch { name: String },

    #[error("Instance hostname not configured")]
    InstanceHostnameNotConfigured,

    #[error("CNAME record not found: please add a CNAME record pointing to {expected}")]
    CnameRecordMissing { expected: String },

    #[error("CNAME does not point to this instance: expected {expected}, got {found}")]
    CnameMismatch { expected: String, found: String },
}

/// Read-only DNS queries needed for verification
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// All TXT values published at `name`
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError>;

    /// CNAME targets published at `name`
    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, LookupError>;
}

/// [`DnsLookup`] backed by hickory's async resolver
pub struct HickoryDnsLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsLookup {
    /// Use the host's resolver configuration, falling back to public upstreams
    pub fn from_system_conf() -> Self {
        match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => Self { resolver },
            Err(e) => {
                warn!(
                    "Failed to read system resolver config ({}), using default upstreams",
                    e
                );
                Self::new(ResolverConfig::default(), ResolverOpts::default())
            }
        }
    }

    /// Use an explicit resolver configuration
    pub fn new(config: ResolverConfig, options: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, options),
        }
    }
}

fn lookup_error(e: ResolveError) -> LookupError {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => LookupError::NoRecords,
        _ => LookupError::Resolver(e.to_string()),
    }
}

#[async_trait]
impl DnsLookup for HickoryDnsLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let lookup = self.resolver.txt_lookup(name).await.map_err(lookup_error)?;

        // A TXT record may be split into several character-strings
        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|part| String::from_utf8_lossy(part))
                    .collect::<String>()
            })
            .collect())
    }

    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
        let lookup = self
            .resolver
            .lookup(name, RecordType::CNAME)
            .await
            .map_err(lookup_error)?;

        Ok(lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::CNAME(cname) => Some(cname.0.to_utf8()),
                _ => None,
            })
            .collect())
    }
}

/// Longest CNAME chain followed before giving up
const MAX_CNAME_HOPS: usize = 8;

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Check the TXT token and the CNAME target of `domain`
///
/// The TXT check runs first; both must pass.
pub async fn verify_dns(
    lookup: &dyn DnsLookup,
    txt_name: &str,
    domain: &str,
    expected_token: &str,
    instance_hostname: Option<&str>,
) -> Result<(), DnsVerificationError> {
    let txt_records = match lookup.lookup_txt(txt_name).await {
        Ok(records) if !records.is_empty() => records,
        Ok(_) => {
            return Err(DnsVerificationError::TxtRecordMissing {
                name: txt_name.to_string(),
            })
        }
        Err(e) => {
            debug!("TXT lookup for {} failed: {}", txt_name, e);
            return Err(DnsVerificationError::TxtRecordMissing {
                name: txt_name.to_string(),
            });
        }
    };

    if !txt_records.iter().any(|value| value == expected_token) {
        return Err(DnsVerificationError::TokenMismatch {
            name: txt_name.to_string(),
        });
    }

    let expected = match instance_hostname.map(normalize_host) {
        Some(host) if !host.is_empty() => host,
        _ => return Err(DnsVerificationError::InstanceHostnameNotConfigured),
    };

    let targets = match lookup.lookup_cname(domain).await {
        Ok(targets) if !targets.is_empty() => targets,
        Ok(_) => return Err(DnsVerificationError::CnameRecordMissing { expected }),
        Err(e) => {
            debug!("CNAME lookup for {} failed: {}", domain, e);
            return Err(DnsVerificationError::CnameRecordMissing { expected });
        }
    };

    // The published target is reported on mismatch; the chain behind it may
    // still lead to the instance
    let found = normalize_host(&targets[0]);
    let mut current = found.clone();
    let mut seen = vec![normalize_host(domain)];

    for _ in 0..MAX_CNAME_HOPS {
        if current == expected {
            return Ok(());
        }
        if seen.contains(&current) {
            debug!("CNAME loop at {}", current);
            break;
        }
        seen.push(current.clone());

        current = match lookup.lookup_cname(&current).await {
            Ok(next) if !next.is_empty() => normalize_host(&next[0]),
            _ => break,
        };
    }

    Err(DnsVerificationError::CnameMismatch { expected, found })
}
