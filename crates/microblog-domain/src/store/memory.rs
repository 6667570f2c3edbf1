use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CustomDomainRecord, DomainStore, StoreError};

#[derive(Default)]
struct MemoryState {
    record: Option<CustomDomainRecord>,
    instance_hostname: Option<String>,
}

/// Process-local [`DomainStore`]; contents are lost on restart
#[derive(Default)]
pub struct MemoryDomainStore {
    state: Mutex<MemoryState>,
}

impl MemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance_hostname(self, hostname: &str) -> Self {
        let mut state = self.state.into_inner();
        state.instance_hostname = Some(hostname.to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    async fn update<F>(&self, domain: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut CustomDomainRecord) + Send,
    {
        let mut state = self.state.lock().await;
        if let Some(record) = state.record.as_mut().filter(|r| r.domain == domain) {
            apply(record);
        }
        Ok(())
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn get(&self) -> Result<Option<CustomDomainRecord>, StoreError> {
        Ok(self.state.lock().await.record.clone())
    }

    async fn insert(&self, domain: &str, token: &str) -> Result<CustomDomainRecord, StoreError> {
        let mut state = self.state.lock().await;
        if state.record.is_some() {
            return Err(StoreError::Conflict);
        }
        let record = CustomDomainRecord::new(domain, token);
        state.record = Some(record.clone());
        Ok(record)
    }

    async fn increment_attempts(&self, domain: &str) -> Result<(), StoreError> {
        self.update(domain, |r| r.verification_attempts += 1).await
    }

    async fn mark_verified(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.update(domain, |r| r.verified_at = Some(at)).await
    }

    async fn mark_activated(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.update(domain, |r| {
            r.activated_at = Some(at);
            r.last_verified_at = Some(at);
        })
        .await
    }

    async fn touch_last_verified(&self, domain: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.update(domain, |r| r.last_verified_at = Some(at)).await
    }

    async fn clear_activation(&self, domain: &str) -> Result<(), StoreError> {
        self.update(domain, |r| r.activated_at = None).await
    }

    async fn delete(&self, domain: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.record.as_ref().is_some_and(|r| r.domain == domain) {
            state.record = None;
        }
        Ok(())
    }

    async fn instance_hostname(&self) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().await.instance_hostname.clone())
    }

    async fn set_instance_hostname(&self, hostname: &str) -> Result<(), StoreError> {
        self.state.lock().await.instance_hostname = Some(hostname.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_record_invariant() {
        let store = MemoryDomainStore::new();
        store.insert("a.example-user.com", "t1").await.unwrap();

        assert!(matches!(
            store.insert("b.example-user.com", "t2").await,
            Err(StoreError::Conflict)
        ));
        assert_eq!(store.get().await.unwrap().unwrap().domain, "a.example-user.com");
    }

    #[tokio::test]
    async fn test_updates_ignore_other_domains() {
        let store = MemoryDomainStore::new();
        store.insert("a.example-user.com", "t1").await.unwrap();

        store.increment_attempts("stale.example-user.com").await.unwrap();
        store.delete("stale.example-user.com").await.unwrap();

        let record = store.get().await.unwrap().unwrap();
        assert_eq!(record.verification_attempts, 0);
    }
}
