//! # Protocol Module
//!
//! Seams to the remote social-graph service.
//!
//! ```text
//! ┌──────────────────────┐   create_agent(host)   ┌──────────────────────┐
//! │  SessionAgent-       │ ─────────────────────► │  AgentFactory        │
//! │  Provider            │                        │  (adapter crate)     │
//! └──────────┬───────────┘                        └──────────┬───────────┘
//!            │ restore_session(did)                          │ builds
//!            ▼                                               ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  AtprotoAgent                                                       │
//! │  search_actors · get_profiles · list_records · create_record        │
//! │  restore_session · revoke_session                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every agent call reports failures as a typed [`UpstreamError`].

mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, UpstreamError};

pub use types::{ActorView, FollowRecord, ListedRecord, ProfileStats, RecordPage};

/// An authenticated client acting on behalf of one restored session.
#[async_trait]
pub trait AtprotoAgent: Send + Sync {
    /// Search the directory for actors matching `query`.
    async fn search_actors(&self, query: &str, limit: u32)
        -> std::result::Result<Vec<ActorView>, UpstreamError>;

    /// Fetch profile statistics for up to 25 actors.
    async fn get_profiles(&self, actors: &[String])
        -> std::result::Result<Vec<ProfileStats>, UpstreamError>;

    /// List one page of `collection` records in `repo`.
    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> std::result::Result<RecordPage, UpstreamError>;

    /// Create a record in `repo`.
    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: serde_json::Value,
    ) -> std::result::Result<(), UpstreamError>;

    /// Load and, if needed, refresh the OAuth session for `did`.
    async fn restore_session(&self, did: &str) -> std::result::Result<(), UpstreamError>;

    /// Revoke the OAuth session for `did` at the authorization server.
    async fn revoke_session(&self, did: &str) -> std::result::Result<(), UpstreamError>;
}

/// Builds agents. Construction is expensive (metadata discovery, keying),
/// which is why the provider caches what this returns.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    /// Construct a fresh, not-yet-restored agent for `host_context`.
    async fn create_agent(&self, host_context: &str) -> Result<Arc<dyn AtprotoAgent>>;
}
