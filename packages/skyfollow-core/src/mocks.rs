//! Mock collaborators for unit testing without a remote service.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! skyfollow-core = { path = "...", features = ["test-support"] }
//! ```

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result, UpstreamError};
use crate::follow::FollowStatusSink;
use crate::protocol::{ActorView, AgentFactory, AtprotoAgent, ListedRecord, ProfileStats, RecordPage};

type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// A directory search hit.
pub fn actor(did: &str, handle: &str, display_name: Option<&str>) -> ActorView {
    ActorView {
        did: did.to_string(),
        handle: handle.to_string(),
        display_name: display_name.map(str::to_string),
        avatar: None,
        description: None,
    }
}

/// One listing page of follow records for `subjects`.
pub fn follow_page(subjects: &[&str], cursor: Option<&str>) -> RecordPage {
    RecordPage {
        records: subjects
            .iter()
            .enumerate()
            .map(|(i, subject)| ListedRecord {
                uri: format!("at://did:plc:me/app.bsky.graph.follow/{}", i),
                cid: None,
                value: serde_json::json!({
                    "$type": "app.bsky.graph.follow",
                    "subject": subject,
                    "createdAt": "2024-01-01T00:00:00.000Z",
                }),
            })
            .collect(),
        cursor: cursor.map(str::to_string),
    }
}

// ── MockAgent ─────────────────────────────────────────────────────────────────

/// Scriptable agent that records every call.
///
/// Unscripted listings return an empty final page, unscripted searches
/// return no actors, and every other call succeeds.
#[derive(Default)]
pub struct MockAgent {
    pages: HashMap<Option<String>, UpstreamResult<RecordPage>>,
    searches: HashMap<String, UpstreamResult<Vec<ActorView>>>,
    search_delays: HashMap<String, Duration>,
    profiles: HashMap<String, ProfileStats>,
    profile_error: Option<UpstreamError>,
    create_errors: HashMap<String, UpstreamError>,
    create_delay: Option<Duration>,
    restore_error: Option<UpstreamError>,
    revoke_error: Option<UpstreamError>,

    list_calls: AtomicUsize,
    search_calls: AtomicUsize,
    restore_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    creates_in_flight: AtomicUsize,
    max_creates_in_flight: AtomicUsize,
    profile_batches: Mutex<Vec<Vec<String>>>,
    created: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl MockAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the listing call made with `cursor`.
    pub fn with_page(mut self, cursor: Option<&str>, page: UpstreamResult<RecordPage>) -> Self {
        self.pages.insert(cursor.map(str::to_string), page);
        self
    }

    /// Answer searches for `query`.
    pub fn with_search(mut self, query: &str, result: UpstreamResult<Vec<ActorView>>) -> Self {
        self.searches.insert(query.to_string(), result);
        self
    }

    /// Hold searches for `query` for `delay` before answering.
    pub fn with_search_delay(mut self, query: &str, delay: Duration) -> Self {
        self.search_delays.insert(query.to_string(), delay);
        self
    }

    /// Profile statistics returned by `get_profiles`.
    pub fn with_profiles(mut self, profiles: Vec<ProfileStats>) -> Self {
        self.profiles
            .extend(profiles.into_iter().map(|p| (p.did.clone(), p)));
        self
    }

    /// Fail every `get_profiles` call.
    pub fn with_profile_error(mut self, error: UpstreamError) -> Self {
        self.profile_error = Some(error);
        self
    }

    /// Fail follows of `subject`.
    pub fn with_create_error(mut self, subject: &str, error: UpstreamError) -> Self {
        self.create_errors.insert(subject.to_string(), error);
        self
    }

    /// Hold every `create_record` call for `delay`.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn with_restore_error(mut self, error: UpstreamError) -> Self {
        self.restore_error = Some(error);
        self
    }

    pub fn with_revoke_error(mut self, error: UpstreamError) -> Self {
        self.revoke_error = Some(error);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn restore_calls(&self) -> usize {
        self.restore_calls.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `create_record` calls observed in flight at once.
    pub fn max_concurrent_creates(&self) -> usize {
        self.max_creates_in_flight.load(Ordering::SeqCst)
    }

    /// The did batches passed to `get_profiles`, in call order.
    pub fn profile_batches(&self) -> Vec<Vec<String>> {
        self.profile_batches.lock().unwrap().clone()
    }

    /// Every `create_record` attempt as `(repo, collection, record)`,
    /// including failed ones.
    pub fn created_records(&self) -> Vec<(String, String, serde_json::Value)> {
        self.created.lock().unwrap().clone()
    }

    /// Subjects of every `create_record` attempt.
    pub fn created_subjects(&self) -> Vec<String> {
        self.created_records()
            .into_iter()
            .filter_map(|(_, _, record)| record["subject"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl AtprotoAgent for MockAgent {
    async fn search_actors(&self, query: &str, _limit: u32) -> UpstreamResult<Vec<ActorView>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.search_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        self.searches.get(query).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_profiles(&self, actors: &[String]) -> UpstreamResult<Vec<ProfileStats>> {
        self.profile_batches.lock().unwrap().push(actors.to_vec());
        if let Some(error) = &self.profile_error {
            return Err(error.clone());
        }
        Ok(actors
            .iter()
            .filter_map(|did| self.profiles.get(did).cloned())
            .collect())
    }

    async fn list_records(
        &self,
        _repo: &str,
        _collection: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> UpstreamResult<RecordPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&cursor.map(str::to_string))
            .cloned()
            .unwrap_or_else(|| Ok(RecordPage::default()))
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: serde_json::Value,
    ) -> UpstreamResult<()> {
        let now = self.creates_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_creates_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        self.creates_in_flight.fetch_sub(1, Ordering::SeqCst);

        let subject = record["subject"].as_str().unwrap_or_default().to_string();
        self.created
            .lock()
            .unwrap()
            .push((repo.to_string(), collection.to_string(), record));

        match self.create_errors.get(&subject) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn restore_session(&self, _did: &str) -> UpstreamResult<()> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        match &self.restore_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn revoke_session(&self, _did: &str) -> UpstreamResult<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        match &self.revoke_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// ── MockAgentFactory ──────────────────────────────────────────────────────────

/// Hands out one shared [`MockAgent`] and counts constructions.
pub struct MockAgentFactory {
    agent: Option<Arc<MockAgent>>,
    created: AtomicUsize,
}

impl MockAgentFactory {
    pub fn new(agent: Arc<MockAgent>) -> Self {
        Self {
            agent: Some(agent),
            created: AtomicUsize::new(0),
        }
    }

    /// A factory whose construction always fails with a configuration error.
    pub fn failing() -> Self {
        Self {
            agent: None,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentFactory for MockAgentFactory {
    async fn create_agent(&self, host_context: &str) -> Result<Arc<dyn AtprotoAgent>> {
        match &self.agent {
            Some(agent) => {
                self.created.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::clone(agent) as Arc<dyn AtprotoAgent>)
            }
            None => Err(Error::Configuration(format!(
                "no client metadata for host {}",
                host_context
            ))),
        }
    }
}

// ── RecordingSink ─────────────────────────────────────────────────────────────

/// Records follow-status mirror writes.
#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    attempts: AtomicUsize,
    updates: Mutex<Vec<(String, String, bool)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every write.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Accepted writes as `(did, collection, following)`.
    pub fn updates(&self) -> Vec<(String, String, bool)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl FollowStatusSink for RecordingSink {
    async fn update_follow_status(&self, did: &str, collection: &str, following: bool) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::DatabaseError("follow_status is read-only".into()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((did.to_string(), collection.to_string(), following));
        Ok(())
    }
}
