//! Custom domain support for a microblog instance
//!
//! An operator brings one domain they own, proves ownership through a TXT
//! record, points it at the instance with a CNAME, and the domain manager
//! installs a matching route in the reverse proxy. Active domains are
//! re-checked periodically and demoted when their DNS stops matching.

pub mod config;
pub mod dns;
pub mod error;
pub mod hostname;
pub mod manager;
pub mod rate_limit;
pub mod status;
pub mod store;
pub mod tasks;
pub mod token;
pub mod validation;

pub use config::DomainConfig;
pub use dns::{DnsLookup, DnsVerificationError, HickoryDnsLookup, LookupError};
pub use error::DomainError;
pub use microblog_proxy::ProxyError;
pub use hostname::{enable_instance_hostname, host_from_header, is_managed_subdomain};
pub use manager::{DomainManager, RevalidationOutcome, VerifyOutcome};
pub use rate_limit::{AttemptLimiter, SlidingWindowLimiter};
pub use status::{DnsInstructions, DomainStatus};
pub use store::{CustomDomainRecord, DomainStore, MemoryDomainStore, SeaOrmDomainStore, StoreError};
pub use tasks::{spawn_revalidation, spawn_startup_sync};
pub use token::generate_verification_token;
pub use validation::{validate_domain, DomainValidationError};
