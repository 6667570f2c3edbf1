//! Custom domain lifecycle
//!
//! registered -> verified (DNS passes) -> activated (proxy route installed)
//! -> periodically re-validated -> removed, or demoted when DNS stops matching.

use chrono::Utc;
use microblog_proxy::{wait_until_available, ProxyError, RouteClient};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dns::{verify_dns, DnsLookup, DnsVerificationError};
use crate::hostname::{enable_instance_hostname, is_managed_subdomain, HostnameDetector};
use crate::rate_limit::{AttemptLimiter, SlidingWindowLimiter};
use crate::status::{DnsInstructions, DomainStatus};
use crate::store::{CustomDomainRecord, DomainStore, StoreError};
use crate::token::generate_verification_token;
use crate::validation::validate_domain;
use crate::{DomainConfig, DomainError};

/// Result of [`DomainManager::verify_and_activate`]
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub record: CustomDomainRecord,
    /// Set when verification passed but activation did not
    pub activation_error: Option<String>,
}

/// Result of one periodic re-validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// No active custom domain
    Skipped,
    StillValid,
    Deactivated(DnsVerificationError),
}

/// Coordinates the record store, DNS, rate limiter and reverse proxy
pub struct DomainManager {
    config: DomainConfig,
    store: Arc<dyn DomainStore>,
    dns: Arc<dyn DnsLookup>,
    proxy: Arc<dyn RouteClient>,
    limiter: Arc<dyn AttemptLimiter>,
    detector: HostnameDetector,
}

impl DomainManager {
    pub fn new(
        config: DomainConfig,
        store: Arc<dyn DomainStore>,
        dns: Arc<dyn DnsLookup>,
        proxy: Arc<dyn RouteClient>,
    ) -> Self {
        let limiter = Arc::new(SlidingWindowLimiter::new(
            config.max_verify_attempts,
            config.verify_window,
        ));
        Self {
            config,
            store,
            dns,
            proxy,
            limiter,
            detector: HostnameDetector::new(),
        }
    }

    /// Replace the default in-memory attempt limiter
    pub fn with_limiter(mut self, limiter: Arc<dyn AttemptLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    async fn current(&self) -> Result<CustomDomainRecord, DomainError> {
        self.store.get().await?.ok_or(DomainError::NotConfigured)
    }

    async fn check_dns(&self, record: &CustomDomainRecord) -> Result<(), DnsVerificationError> {
        let instance_hostname = match self.store.instance_hostname().await {
            Ok(hostname) => hostname,
            Err(e) => {
                warn!("Failed to read instance hostname: {}", e);
                None
            }
        };
        verify_dns(
            self.dns.as_ref(),
            &self.config.txt_record_name(&record.domain),
            &record.domain,
            &record.verification_token,
            instance_hostname.as_deref(),
        )
        .await
    }

    async fn custom_domains_enabled(&self) -> Result<bool, DomainError> {
        Ok(self
            .store
            .instance_hostname()
            .await?
            .is_some_and(|host| is_managed_subdomain(&host, &self.config.managed_domains)))
    }

    /// Register a new custom domain and issue its verification token
    pub async fn register(&self, input: &str) -> Result<CustomDomainRecord, DomainError> {
        if self.store.get().await?.is_some() {
            return Err(DomainError::AlreadyConfigured);
        }

        let domain = validate_domain(input, &self.config)?;

        if !self.custom_domains_enabled().await? {
            return Err(DomainError::CustomDomainsDisabled);
        }

        let token = generate_verification_token(&self.config.token_prefix);
        let record = self
            .store
            .insert(&domain, &token)
            .await
            .map_err(|e| match e {
                StoreError::Conflict => DomainError::AlreadyConfigured,
                other => DomainError::Store(other),
            })?;

        info!(
            "Custom domain added: {} (token: {}...)",
            record.domain,
            record.verification_token.chars().take(12).collect::<String>()
        );
        Ok(record)
    }

    /// Check the DNS records and mark the domain verified
    ///
    /// Every call counts as an attempt; over the rate limit no lookup is made.
    pub async fn verify(&self) -> Result<CustomDomainRecord, DomainError> {
        let record = self.current().await?;

        if let Err(e) = self.store.increment_attempts(&record.domain).await {
            warn!("Failed to update verification attempts: {}", e);
        }

        if !self.limiter.try_acquire(&record.domain) {
            warn!("Verification rate limit reached for {}", record.domain);
            return Err(DomainError::RateLimited);
        }

        if let Err(e) = self.check_dns(&record).await {
            info!("Verification of {} failed: {}", record.domain, e);
            return Err(e.into());
        }

        self.store.mark_verified(&record.domain, Utc::now()).await?;
        info!("Custom domain verified: {}", record.domain);
        self.current().await
    }

    /// Re-check DNS and install the reverse-proxy route
    ///
    /// Local state only changes once the proxy accepted the route.
    pub async fn activate(&self) -> Result<CustomDomainRecord, DomainError> {
        let record = self.current().await?;
        if !record.is_verified() {
            return Err(DomainError::NotVerified);
        }
        if record.is_activated() {
            return Err(DomainError::AlreadyActivated);
        }

        self.check_dns(&record).await?;

        if !self.proxy.is_available().await {
            return Err(ProxyError::Unavailable.into());
        }
        self.proxy.add_route(&record.domain).await?;

        self.store.mark_activated(&record.domain, Utc::now()).await?;
        info!("Custom domain activated: {}", record.domain);
        self.current().await
    }

    /// Verify, then try to activate straight away
    pub async fn verify_and_activate(&self) -> Result<VerifyOutcome, DomainError> {
        let record = self.verify().await?;
        if record.is_activated() {
            return Ok(VerifyOutcome {
                record,
                activation_error: None,
            });
        }

        match self.activate().await {
            Ok(record) => Ok(VerifyOutcome {
                record,
                activation_error: None,
            }),
            Err(e) => {
                warn!("Domain verified but activation failed: {}", e);
                Ok(VerifyOutcome {
                    record,
                    activation_error: Some(e.to_string()),
                })
            }
        }
    }

    /// Drop the custom domain, withdrawing its proxy route first if active
    pub async fn remove(&self) -> Result<(), DomainError> {
        let record = self.current().await?;

        if record.is_activated() {
            self.withdraw_route(&record.domain).await;
        }

        self.store.delete(&record.domain).await?;
        info!("Custom domain removed: {}", record.domain);
        Ok(())
    }

    /// Best-effort route removal; failures are logged only
    async fn withdraw_route(&self, domain: &str) {
        if !self.proxy.is_available().await {
            warn!(
                "Reverse proxy unavailable, skipping route removal for {}",
                domain
            );
            return;
        }
        if let Err(e) = self.proxy.remove_route(domain).await {
            warn!("Failed to remove reverse proxy route for {}: {}", domain, e);
        }
    }

    /// Re-check DNS of the active domain, demoting it on failure
    pub async fn revalidate(&self) -> Result<RevalidationOutcome, DomainError> {
        let record = match self.store.get().await? {
            Some(record) if record.is_activated() => record,
            _ => return Ok(RevalidationOutcome::Skipped),
        };

        info!("Re-validating custom domain: {}", record.domain);

        match self.check_dns(&record).await {
            Ok(()) => {
                self.store
                    .touch_last_verified(&record.domain, Utc::now())
                    .await?;
                info!("Domain {} re-verification successful", record.domain);
                Ok(RevalidationOutcome::StillValid)
            }
            Err(reason) => {
                warn!(
                    "Domain {} failed re-verification: {}",
                    record.domain, reason
                );
                if let Err(e) = self.store.clear_activation(&record.domain).await {
                    error!("Failed to deactivate domain {}: {}", record.domain, e);
                }
                self.withdraw_route(&record.domain).await;
                Ok(RevalidationOutcome::Deactivated(reason))
            }
        }
    }

    /// Re-install the route of an active domain after a restart
    ///
    /// Returns `false` when there is nothing to sync.
    pub async fn sync_on_startup(&self) -> Result<bool, DomainError> {
        let record = match self.store.get().await? {
            Some(record) if record.is_activated() => record,
            _ => {
                debug!("Startup sync: no activated custom domain to sync");
                return Ok(false);
            }
        };

        let available = wait_until_available(
            self.proxy.as_ref(),
            self.config.proxy_check_attempts,
            self.config.proxy_check_delay,
        )
        .await;
        if !available {
            return Err(ProxyError::Unavailable.into());
        }

        self.proxy.add_route(&record.domain).await?;
        info!(
            "Startup sync: registered route for custom domain {}",
            record.domain
        );
        Ok(true)
    }

    /// Enable custom domains using the hostname the admin is connected through
    pub async fn enable_for_host(&self, host: &str) -> Result<String, DomainError> {
        enable_instance_hostname(self.store.as_ref(), &self.config.managed_domains, host).await
    }

    /// Feed a request's `Host` header to the one-shot hostname detector
    pub async fn detect_hostname(&self, host_header: &str) {
        if self.detector.has_observed() {
            return;
        }
        self.detector
            .observe(
                self.store.as_ref(),
                &self.config.managed_domains,
                host_header,
            )
            .await;
    }

    pub async fn status(&self) -> Result<DomainStatus, DomainError> {
        let instance_hostname = self.store.instance_hostname().await?;
        let custom_domains_enabled = instance_hostname
            .as_deref()
            .is_some_and(|host| is_managed_subdomain(host, &self.config.managed_domains));

        let status = match self.store.get().await? {
            None => DomainStatus {
                configured: false,
                custom_domains_enabled,
                instance_hostname,
                domain: None,
                verified: false,
                activated: false,
                attempts: 0,
                attempts_left: self.config.max_verify_attempts,
                verified_at: None,
                activated_at: None,
                last_verified_at: None,
                dns: None,
            },
            Some(record) => DomainStatus {
                configured: true,
                custom_domains_enabled,
                dns: Some(DnsInstructions {
                    txt_name: self.config.txt_record_name(&record.domain),
                    txt_value: record.verification_token.clone(),
                    cname_name: record.domain.clone(),
                    cname_target: instance_hostname.clone(),
                }),
                instance_hostname,
                verified: record.is_verified(),
                activated: record.is_activated(),
                attempts: record.verification_attempts,
                attempts_left: self.limiter.remaining(&record.domain),
                verified_at: record.verified_at,
                activated_at: record.activated_at,
                last_verified_at: record.last_verified_at,
                domain: Some(record.domain),
            },
        };
        Ok(status)
    }
}
