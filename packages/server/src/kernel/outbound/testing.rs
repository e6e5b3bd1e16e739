//! Test doubles for the delivery engine.
//!
//! A scripted platform (programmable outcomes + call counting), fixed
//! credential resolvers, an in-memory content catalog, and a recording
//! telemetry sink, assembled by [`TestDependencies`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use instagram::InstagramError;

use super::action::MediaType;
use super::events::DeliveryEvent;
use super::store::{ActionStore, MemoryActionStore};
use crate::kernel::deps::DeliveryDeps;
use crate::kernel::traits::{
    AccountCredentials, BaseContentCatalog, BaseCredentialService, BasePlatformService,
    BaseTelemetrySink, RepostSource,
};

// =============================================================================
// ScriptedPlatform
// =============================================================================

/// Platform fake. Each method pops the next queued outcome, or succeeds with
/// a generated id when nothing is queued. Calls are counted so tests can
/// assert how many times a step actually ran.
#[derive(Default)]
pub struct ScriptedPlatform {
    reply_results: Mutex<VecDeque<Result<String, InstagramError>>>,
    message_results: Mutex<VecDeque<Result<String, InstagramError>>>,
    create_results: Mutex<VecDeque<Result<String, InstagramError>>>,
    publish_results: Mutex<VecDeque<Result<String, InstagramError>>>,

    reply_calls: AtomicUsize,
    message_calls: AtomicUsize,
    create_calls: AtomicUsize,
    publish_calls: AtomicUsize,

    message_delay: Mutex<Option<Duration>>,
    id_counter: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_reply(&self, result: Result<String, InstagramError>) {
        self.reply_results.lock().unwrap().push_back(result);
    }

    pub fn queue_message(&self, result: Result<String, InstagramError>) {
        self.message_results.lock().unwrap().push_back(result);
    }

    pub fn queue_create(&self, result: Result<String, InstagramError>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    pub fn queue_publish(&self, result: Result<String, InstagramError>) {
        self.publish_results.lock().unwrap().push_back(result);
    }

    /// Delay every `send_message` call; used to hold a tick mid-flight.
    pub fn set_message_delay(&self, delay: Duration) {
        *self.message_delay.lock().unwrap() = Some(delay);
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.id_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn pop_or_default(
        queue: &Mutex<VecDeque<Result<String, InstagramError>>>,
        fallback: String,
    ) -> Result<String, InstagramError> {
        match queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(fallback),
        }
    }
}

#[async_trait]
impl BasePlatformService for ScriptedPlatform {
    async fn reply_to_comment(
        &self,
        _credentials: &AccountCredentials,
        _comment_id: &str,
        _text: &str,
    ) -> Result<String, InstagramError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop_or_default(&self.reply_results, self.next_id("reply"))
    }

    async fn send_message(
        &self,
        _credentials: &AccountCredentials,
        _recipient_id: &str,
        _text: &str,
    ) -> Result<String, InstagramError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.message_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::pop_or_default(&self.message_results, self.next_id("mid"))
    }

    async fn create_media_container(
        &self,
        _credentials: &AccountCredentials,
        _media_url: &str,
        _caption: &str,
        _media_type: MediaType,
    ) -> Result<String, InstagramError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop_or_default(&self.create_results, self.next_id("container"))
    }

    async fn publish_media_container(
        &self,
        _credentials: &AccountCredentials,
        _creation_id: &str,
    ) -> Result<String, InstagramError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Self::pop_or_default(&self.publish_results, self.next_id("media"))
    }
}

// =============================================================================
// Credential fakes
// =============================================================================

/// Resolves every account to the same fixed credentials.
pub struct StaticCredentials;

#[async_trait]
impl BaseCredentialService for StaticCredentials {
    async fn resolve(&self, _account_id: Uuid) -> Result<AccountCredentials> {
        Ok(AccountCredentials {
            platform_user_id: "ig-user-1".to_string(),
            access_token: "test-token".to_string(),
        })
    }
}

/// Fails every resolution, as a disconnected account would.
pub struct FailingCredentials;

#[async_trait]
impl BaseCredentialService for FailingCredentials {
    async fn resolve(&self, account_id: Uuid) -> Result<AccountCredentials> {
        Err(anyhow!("no active connected account {}", account_id))
    }
}

// =============================================================================
// MemoryCatalog
// =============================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    sources: RwLock<HashMap<Uuid, RepostSource>>,
    published: Mutex<Vec<(Uuid, String)>>,
    fail_mark_published: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_source(&self, permission_id: Uuid, source: RepostSource) {
        self.sources.write().unwrap().insert(permission_id, source);
    }

    pub fn remove_source(&self, permission_id: Uuid) {
        self.sources.write().unwrap().remove(&permission_id);
    }

    pub fn published(&self) -> Vec<(Uuid, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn fail_mark_published(&self, fail: bool) {
        self.fail_mark_published.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaseContentCatalog for MemoryCatalog {
    async fn find_repost_source(&self, permission_id: Uuid) -> Result<Option<RepostSource>> {
        Ok(self.sources.read().unwrap().get(&permission_id).cloned())
    }

    async fn mark_post_published(&self, post_id: Uuid, media_id: &str) -> Result<()> {
        if self.fail_mark_published.load(Ordering::SeqCst) {
            return Err(anyhow!("scheduled_posts unavailable"));
        }
        self.published
            .lock()
            .unwrap()
            .push((post_id, media_id.to_string()));
        Ok(())
    }
}

// =============================================================================
// RecordingTelemetry
// =============================================================================

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<DeliveryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseTelemetrySink for RecordingTelemetry {
    async fn record(&self, event: DeliveryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// All doubles assembled, with handles kept for assertions.
pub struct TestDependencies {
    pub store: Arc<MemoryActionStore>,
    pub platform: Arc<ScriptedPlatform>,
    pub catalog: Arc<MemoryCatalog>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryActionStore::new()),
            platform: Arc::new(ScriptedPlatform::new()),
            catalog: Arc::new(MemoryCatalog::new()),
            telemetry: Arc::new(RecordingTelemetry::new()),
        }
    }

    pub fn deps(&self) -> DeliveryDeps {
        DeliveryDeps::new(
            self.store.clone() as Arc<dyn ActionStore>,
            self.platform.clone(),
            Arc::new(StaticCredentials),
            self.catalog.clone(),
            self.telemetry.clone(),
        )
    }

    /// Same assembly but with a credential service that always fails.
    pub fn deps_with_failing_credentials(&self) -> DeliveryDeps {
        DeliveryDeps::new(
            self.store.clone() as Arc<dyn ActionStore>,
            self.platform.clone(),
            Arc::new(FailingCredentials),
            self.catalog.clone(),
            self.telemetry.clone(),
        )
    }
}

/// Convenience for tests that only need the container.
pub fn test_deps() -> DeliveryDeps {
    TestDependencies::new().deps()
}
