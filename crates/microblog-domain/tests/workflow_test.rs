/// Integration tests for the custom domain workflow
/// Fake DNS and reverse proxy; records live in memory or in sqlite
use async_trait::async_trait;
use microblog_domain::{
    AttemptLimiter, DnsLookup, DnsVerificationError, DomainConfig, DomainError, DomainManager,
    DomainStore, DomainValidationError, LookupError, MemoryDomainStore, RevalidationOutcome,
    SeaOrmDomainStore,
};
use microblog_proxy::{route_id, ProxyError, RouteClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const INSTANCE: &str = "alice.microblog.host";
const DOMAIN: &str = "blog.example-user.com";

#[derive(Default)]
struct FakeDns {
    txt: Mutex<HashMap<String, Vec<String>>>,
    cname: Mutex<HashMap<String, Vec<String>>>,
    queries: AtomicUsize,
}

impl FakeDns {
    fn set_txt(&self, name: &str, value: &str) {
        self.txt
            .lock()
            .unwrap()
            .insert(name.to_string(), vec![value.to_string()]);
    }

    fn set_cname(&self, name: &str, target: &str) {
        self.cname
            .lock()
            .unwrap()
            .insert(name.to_string(), vec![target.to_string()]);
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsLookup for FakeDns {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.txt
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(LookupError::NoRecords)
    }

    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, LookupError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.cname
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(LookupError::NoRecords)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProxyCall {
    Add(String),
    Remove(String),
}

struct RecordingProxy {
    calls: Mutex<Vec<ProxyCall>>,
    available: AtomicBool,
    reject_routes: AtomicBool,
    fail_removals: AtomicBool,
}

impl Default for RecordingProxy {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            reject_routes: AtomicBool::new(false),
            fail_removals: AtomicBool::new(false),
        }
    }
}

impl RecordingProxy {
    fn calls(&self) -> Vec<ProxyCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouteClient for RecordingProxy {
    async fn add_route(&self, domain: &str) -> Result<(), ProxyError> {
        if self.reject_routes.load(Ordering::SeqCst) {
            return Err(ProxyError::Api {
                status: 400,
                body: "invalid route".to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap()
            .push(ProxyCall::Add(route_id(domain)));
        Ok(())
    }

    async fn remove_route(&self, domain: &str) -> Result<(), ProxyError> {
        self.calls
            .lock()
            .unwrap()
            .push(ProxyCall::Remove(route_id(domain)));
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(ProxyError::Api {
                status: 500,
                body: "admin API failure".to_string(),
            });
        }
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

struct Harness {
    manager: DomainManager,
    store: Arc<dyn DomainStore>,
    dns: Arc<FakeDns>,
    proxy: Arc<RecordingProxy>,
}

fn harness_with_store(store: Arc<dyn DomainStore>) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let dns = Arc::new(FakeDns::default());
    let proxy = Arc::new(RecordingProxy::default());
    let manager = DomainManager::new(
        DomainConfig::default(),
        store.clone(),
        dns.clone(),
        proxy.clone(),
    );
    Harness {
        manager,
        store,
        dns,
        proxy,
    }
}

fn harness() -> Harness {
    harness_with_store(Arc::new(
        MemoryDomainStore::new().with_instance_hostname(INSTANCE),
    ))
}

/// Publish correct TXT and CNAME records for the registered domain
fn publish_records(h: &Harness, token: &str) {
    h.dns.set_txt(&format!("_microblog-verify.{}", DOMAIN), token);
    h.dns.set_cname(DOMAIN, &format!("{}.", INSTANCE));
}

#[tokio::test]
async fn test_registration_rejects_invalid_domains() {
    let h = harness();

    for input in ["*.example-user.com", "192.168.1.10", "::1", "localdomain", ""] {
        let err = h.manager.register(input).await.unwrap_err();
        assert!(
            matches!(err, DomainError::Validation(_)),
            "{input:?} should fail validation, got {err:?}"
        );
    }
    assert!(h.store.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_registration_rejects_managed_domains() {
    let h = harness();

    let err = h.manager.register("bob.microblog.host").await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Validation(DomainValidationError::Blocked)
    ));
}

#[tokio::test]
async fn test_second_registration_conflicts_regardless_of_validity() {
    let h = harness();
    h.manager.register(DOMAIN).await.unwrap();

    for input in ["other.example-user.com", "*.bad", "10.0.0.1", DOMAIN] {
        let err = h.manager.register(input).await.unwrap_err();
        assert!(
            matches!(err, DomainError::AlreadyConfigured),
            "{input:?} should conflict, got {err:?}"
        );
    }
}

#[tokio::test]
async fn test_registration_normalizes_and_issues_token() {
    let h = harness();

    let record = h.manager.register("  Blog.Example-User.COM  ").await.unwrap();
    assert_eq!(record.domain, DOMAIN);
    assert!(record.verification_token.starts_with("mblg_"));
    assert!(!record.is_verified());
    assert_eq!(record.verification_attempts, 0);
}

#[tokio::test]
async fn test_registration_requires_managed_instance_hostname() {
    let h = harness_with_store(Arc::new(MemoryDomainStore::new()));
    let err = h.manager.register(DOMAIN).await.unwrap_err();
    assert!(matches!(err, DomainError::CustomDomainsDisabled));

    let h = harness_with_store(Arc::new(
        MemoryDomainStore::new().with_instance_hostname("blog.selfhosted.net"),
    ));
    let err = h.manager.register(DOMAIN).await.unwrap_err();
    assert!(matches!(err, DomainError::CustomDomainsDisabled));
}

#[tokio::test]
async fn test_verification_requires_both_records() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    let txt_name = format!("_microblog-verify.{}", DOMAIN);

    // Nothing published
    let err = h.manager.verify().await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Dns(DnsVerificationError::TxtRecordMissing { .. })
    ));

    // Wrong token, correct CNAME
    h.dns.set_txt(&txt_name, "mblg_wrong");
    h.dns.set_cname(DOMAIN, INSTANCE);
    let err = h.manager.verify().await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Dns(DnsVerificationError::TokenMismatch { .. })
    ));

    // Correct token, CNAME elsewhere
    h.dns.set_txt(&txt_name, &record.verification_token);
    h.dns.set_cname(DOMAIN, "someone-else.microblog.host");
    let err = h.manager.verify().await.unwrap_err();
    match err {
        DomainError::Dns(DnsVerificationError::CnameMismatch { expected, found }) => {
            assert_eq!(expected, INSTANCE);
            assert_eq!(found, "someone-else.microblog.host");
        }
        other => panic!("expected CNAME mismatch, got {other:?}"),
    }

    // Both correct; trailing dot on the CNAME target is fine
    h.dns.set_cname(DOMAIN, &format!("{}.", INSTANCE));
    let verified = h.manager.verify().await.unwrap();
    assert!(verified.is_verified());
    assert!(!verified.is_activated());
    assert_eq!(verified.verification_attempts, 4);
}

#[tokio::test]
async fn test_sixth_attempt_is_rate_limited_without_lookups() {
    let h = harness();
    h.manager.register(DOMAIN).await.unwrap();

    for _ in 0..5 {
        assert!(matches!(
            h.manager.verify().await.unwrap_err(),
            DomainError::Dns(_)
        ));
    }
    let queries = h.dns.queries();

    let err = h.manager.verify().await.unwrap_err();
    assert!(matches!(err, DomainError::RateLimited));
    assert_eq!(h.dns.queries(), queries);

    let status = h.manager.status().await.unwrap();
    assert_eq!(status.attempts, 6);
    assert_eq!(status.attempts_left, 0);
}

#[tokio::test]
async fn test_activation_requires_verification() {
    let h = harness();
    h.manager.register(DOMAIN).await.unwrap();

    let err = h.manager.activate().await.unwrap_err();
    assert!(matches!(err, DomainError::NotVerified));
    assert!(h.proxy.calls().is_empty());
}

#[tokio::test]
async fn test_activation_installs_route() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify().await.unwrap();

    let active = h.manager.activate().await.unwrap();
    assert!(active.activated_at.is_some());
    assert_eq!(active.last_verified_at, active.activated_at);
    assert_eq!(
        h.proxy.calls(),
        vec![ProxyCall::Add("custom-domain-blog.example-user.com".to_string())]
    );

    let err = h.manager.activate().await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyActivated));
}

#[tokio::test]
async fn test_activation_rechecks_dns() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify().await.unwrap();

    h.dns.set_cname(DOMAIN, "elsewhere.example-host.net");
    let err = h.manager.activate().await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Dns(DnsVerificationError::CnameMismatch { .. })
    ));
    assert!(h.proxy.calls().is_empty());
    assert!(!h.store.get().await.unwrap().unwrap().is_activated());
}

#[tokio::test]
async fn test_activation_leaves_state_when_proxy_fails() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify().await.unwrap();

    h.proxy.available.store(false, Ordering::SeqCst);
    let err = h.manager.activate().await.unwrap_err();
    assert!(matches!(err, DomainError::Proxy(ProxyError::Unavailable)));

    h.proxy.available.store(true, Ordering::SeqCst);
    h.proxy.reject_routes.store(true, Ordering::SeqCst);
    let err = h.manager.activate().await.unwrap_err();
    assert!(matches!(err, DomainError::Proxy(ProxyError::Api { status: 400, .. })));

    assert!(!h.store.get().await.unwrap().unwrap().is_activated());
}

#[tokio::test]
async fn test_verify_and_activate_reports_soft_activation_failure() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.proxy.available.store(false, Ordering::SeqCst);

    let outcome = h.manager.verify_and_activate().await.unwrap();
    assert!(outcome.record.is_verified());
    assert!(!outcome.record.is_activated());
    assert!(outcome.activation_error.is_some());

    h.proxy.available.store(true, Ordering::SeqCst);
    let outcome = h.manager.verify_and_activate().await.unwrap();
    assert!(outcome.record.is_activated());
    assert!(outcome.activation_error.is_none());
}

#[tokio::test]
async fn test_remove_withdraws_route_only_when_activated() {
    let h = harness();
    h.manager.register(DOMAIN).await.unwrap();
    h.manager.remove().await.unwrap();
    assert!(h.proxy.calls().is_empty());
    assert!(h.store.get().await.unwrap().is_none());

    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify_and_activate().await.unwrap();
    h.manager.remove().await.unwrap();

    let id = route_id(DOMAIN);
    assert_eq!(
        h.proxy.calls(),
        vec![ProxyCall::Add(id.clone()), ProxyCall::Remove(id)]
    );
    assert!(h.store.get().await.unwrap().is_none());

    let err = h.manager.remove().await.unwrap_err();
    assert!(matches!(err, DomainError::NotConfigured));
}

#[tokio::test]
async fn test_remove_succeeds_when_proxy_is_down() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify_and_activate().await.unwrap();

    h.proxy.available.store(false, Ordering::SeqCst);
    h.manager.remove().await.unwrap();
    assert!(h.store.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_remove_succeeds_when_route_delete_fails() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify_and_activate().await.unwrap();

    h.proxy.fail_removals.store(true, Ordering::SeqCst);
    h.manager.remove().await.unwrap();

    assert_eq!(
        h.proxy.calls().last(),
        Some(&ProxyCall::Remove(route_id(DOMAIN)))
    );
    assert!(h.store.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_revalidation_demotes_on_cname_change() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify_and_activate().await.unwrap();

    assert_eq!(
        h.manager.revalidate().await.unwrap(),
        RevalidationOutcome::StillValid
    );

    h.dns.set_cname(DOMAIN, "elsewhere.example-host.net");
    let outcome = h.manager.revalidate().await.unwrap();
    assert!(matches!(
        outcome,
        RevalidationOutcome::Deactivated(DnsVerificationError::CnameMismatch { .. })
    ));

    let record = h.store.get().await.unwrap().unwrap();
    assert!(record.is_verified());
    assert!(!record.is_activated());
    assert_eq!(
        h.proxy.calls().last(),
        Some(&ProxyCall::Remove(route_id(DOMAIN)))
    );

    assert_eq!(
        h.manager.revalidate().await.unwrap(),
        RevalidationOutcome::Skipped
    );
}

#[tokio::test]
async fn test_startup_sync_restores_active_route() {
    let h = harness();
    assert!(!h.manager.sync_on_startup().await.unwrap());

    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify().await.unwrap();
    assert!(!h.manager.sync_on_startup().await.unwrap());
    assert!(h.proxy.calls().is_empty());

    h.manager.activate().await.unwrap();
    assert!(h.manager.sync_on_startup().await.unwrap());
    assert_eq!(h.proxy.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_startup_sync_gives_up_when_proxy_never_comes_up() {
    let h = harness();
    let record = h.manager.register(DOMAIN).await.unwrap();
    publish_records(&h, &record.verification_token);
    h.manager.verify_and_activate().await.unwrap();

    h.proxy.available.store(false, Ordering::SeqCst);
    let err = h.manager.sync_on_startup().await.unwrap_err();
    assert!(matches!(err, DomainError::Proxy(ProxyError::Unavailable)));
}

#[tokio::test]
async fn test_enable_for_host() {
    let h = harness_with_store(Arc::new(MemoryDomainStore::new()));

    let err = h.manager.enable_for_host("localhost:8080").await.unwrap_err();
    assert!(matches!(err, DomainError::NotManagedHost(_)));
    let err = h.manager.enable_for_host("  ").await.unwrap_err();
    assert!(matches!(err, DomainError::HostnameMissing));

    let host = h
        .manager
        .enable_for_host("Alice.Microblog.Host:443")
        .await
        .unwrap();
    assert_eq!(host, INSTANCE);
    assert!(h.manager.status().await.unwrap().custom_domains_enabled);

    let err = h.manager.enable_for_host(INSTANCE).await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyEnabled(_)));
}

#[tokio::test]
async fn test_hostname_detection_is_one_shot() {
    let h = harness_with_store(Arc::new(MemoryDomainStore::new()));

    h.manager.detect_hostname("localhost:8080").await;
    h.manager.detect_hostname(INSTANCE).await;
    assert_eq!(h.store.instance_hostname().await.unwrap(), None);

    let h = harness_with_store(Arc::new(MemoryDomainStore::new()));
    h.manager.detect_hostname(INSTANCE).await;
    assert_eq!(
        h.store.instance_hostname().await.unwrap().as_deref(),
        Some(INSTANCE)
    );
}

#[tokio::test]
async fn test_status_walkthrough() {
    let h = harness();

    let status = h.manager.status().await.unwrap();
    assert!(!status.configured);
    assert!(status.custom_domains_enabled);
    assert!(status.dns.is_none());

    let record = h.manager.register(DOMAIN).await.unwrap();
    let status = h.manager.status().await.unwrap();
    assert!(status.configured);
    assert!(!status.verified);
    assert_eq!(status.attempts_left, 5);
    let dns = status.dns.unwrap();
    assert_eq!(dns.txt_name, "_microblog-verify.blog.example-user.com");
    assert_eq!(dns.txt_value, record.verification_token);
    assert_eq!(dns.cname_name, DOMAIN);
    assert_eq!(dns.cname_target.as_deref(), Some(INSTANCE));

    publish_records(&h, &record.verification_token);
    let outcome = h.manager.verify_and_activate().await.unwrap();
    assert!(outcome.activation_error.is_none());
    let status = h.manager.status().await.unwrap();
    assert!(status.verified);
    assert!(status.activated);
    assert_eq!(status.attempts_left, 4);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["customDomainsEnabled"], true);
    assert_eq!(json["attemptsLeft"], 4);
    assert!(json["dns"]["cnameTarget"].is_string());

    h.manager.remove().await.unwrap();
    assert!(!h.manager.status().await.unwrap().configured);
}

#[tokio::test]
async fn test_workflow_on_sqlite_store() {
    let db = microblog_db::connect("sqlite::memory:").await.unwrap();
    microblog_db::migrate(&db).await.unwrap();
    let store = Arc::new(SeaOrmDomainStore::new(db));
    store.set_instance_hostname(INSTANCE).await.unwrap();

    let h = harness_with_store(store);
    let record = h.manager.register(DOMAIN).await.unwrap();
    assert!(matches!(
        h.manager.register("other.example-user.com").await.unwrap_err(),
        DomainError::AlreadyConfigured
    ));

    publish_records(&h, &record.verification_token);
    let outcome = h.manager.verify_and_activate().await.unwrap();
    assert!(outcome.record.is_activated());
    assert_eq!(outcome.record.verification_attempts, 1);

    h.dns.set_txt(&format!("_microblog-verify.{}", DOMAIN), "mblg_gone");
    assert!(matches!(
        h.manager.revalidate().await.unwrap(),
        RevalidationOutcome::Deactivated(DnsVerificationError::TokenMismatch { .. })
    ));
    let stored = h.store.get().await.unwrap().unwrap();
    assert!(stored.activated_at.is_none());
    assert!(stored.verified_at.is_some());

    h.manager.remove().await.unwrap();
    assert!(h.store.get().await.unwrap().is_none());
}

/// Limiter that refuses every attempt
struct ClosedLimiter;

impl AttemptLimiter for ClosedLimiter {
    fn try_acquire(&self, _key: &str) -> bool {
        false
    }

    fn remaining(&self, _key: &str) -> u32 {
        0
    }
}

#[tokio::test]
async fn test_injected_limiter_gates_verification() {
    let store: Arc<dyn DomainStore> =
        Arc::new(MemoryDomainStore::new().with_instance_hostname(INSTANCE));
    let dns = Arc::new(FakeDns::default());
    let manager = DomainManager::new(
        DomainConfig::default(),
        store.clone(),
        dns.clone(),
        Arc::new(RecordingProxy::default()),
    )
    .with_limiter(Arc::new(ClosedLimiter));

    let record = manager.register(DOMAIN).await.unwrap();
    dns.set_txt(
        &format!("_microblog-verify.{}", DOMAIN),
        &record.verification_token,
    );
    dns.set_cname(DOMAIN, INSTANCE);

    let err = manager.verify().await.unwrap_err();
    assert!(matches!(err, DomainError::RateLimited));
    assert_eq!(dns.queries(), 0);

    let status = manager.status().await.unwrap();
    assert_eq!(status.attempts, 1);
    assert_eq!(status.attempts_left, 0);
    assert!(!status.verified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_keep_one_domain() {
    let path = std::env::temp_dir().join(format!(
        "microblog-concurrent-register-{}.db",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let db = microblog_db::connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();
    microblog_db::migrate(&db).await.unwrap();
    let store = Arc::new(SeaOrmDomainStore::new(db));
    store.set_instance_hostname(INSTANCE).await.unwrap();

    let manager = Arc::new(DomainManager::new(
        DomainConfig::default(),
        store.clone(),
        Arc::new(FakeDns::default()),
        Arc::new(RecordingProxy::default()),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .register(&format!("site{}.example-user.com", i))
                    .await
            })
        })
        .collect();

    let mut registered = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => registered.push(record.domain),
            Err(DomainError::AlreadyConfigured) => {}
            Err(e) => panic!("unexpected registration error: {e}"),
        }
    }

    assert_eq!(registered.len(), 1);
    let status = manager.status().await.unwrap();
    assert_eq!(status.domain.as_deref(), Some(registered[0].as_str()));

    manager.remove().await.unwrap();
    assert!(store.get().await.unwrap().is_none());

    drop(manager);
    drop(store);
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.clone().into_os_string();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
