//! Custom domain record storage
//!
//! At most one custom domain exists per instance, so the store exposes the
//! record as an `Option` rather than a collection.

mod memory;
mod sea_orm_store;

pub use memory::MemoryDomainStore;
pub use sea_orm_store::SeaOrmDomainStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a [`DomainStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A custom domain record already exists")]
    Conflict,

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// The instance's custom domain and its verification lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDomainRecord {
    pub domain: String,
    /// Immutable for the life of the record
    pub verification_token: String,
    pub verified_at: Option<DateTime<Utc>>,
    /// Only ever set while `verified_at` is set
    pub activated_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub verification_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl CustomDomainRecord {
    pub fn new(domain: impl Into<String>, verification_token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            verification_token: verification_token.into(),
            verified_at: None,
            activated_at: None,
            last_verified_at: None,
            verification_attempts: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    pub fn is_activated(&self) -> bool {
        self.activated_at.is_some()
    }
}

/// Persistence for the single custom domain record and the instance hostname
///
/// Field updates are keyed by domain so that a stale caller cannot modify a
/// record registered after its own was removed.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// The configured custom domain, if any
    async fn get(&self) -> Result<Option<CustomDomainRecord>, StoreError>;

    /// Create the record; fails with [`StoreError::Conflict`] if one exists
    async fn insert(&self, domain: &str, token: &str) -> Result<CustomDomainRecord, StoreError>;

    async fn increment_attempts(&self, domain: &str) -> Result<(), StoreError>;

    async fn mark_verified(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Stamp both `activated_at` and `last_verified_at`
    async fn mark_activated(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn touch_last_verified(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Demote an active record back to inactive
    async fn clear_activation(&self, domain: &str) -> Result<(), StoreError>;

    async fn delete(&self, domain: &str) -> Result<(), StoreError>;

    async fn instance_hostname(&self) -> Result<Option<String>, StoreError>;

    async fn set_instance_hostname(&self, hostname: &str) -> Result<(), StoreError>;
}
