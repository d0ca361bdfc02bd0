//! # Follow Module
//!
//! Follow-status resolution and batch follow mutation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FOLLOW PIPELINE                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  targets ──► FollowStatusResolver ──► already-followed set             │
//! │                  │ list_records(self, collection, cursor, 100)         │
//! │                  │ stops on last page OR when every target resolved    │
//! │                  ▼                                                      │
//! │  BatchFollowOrchestrator                                               │
//! │      ≤5 create_record calls in flight                                  │
//! │      already followed → no mutation, success                           │
//! │      RateLimited      → hold slot 1s, report failure                   │
//! │      every outcome    → FollowResult (never aborts the batch)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod batch;
mod status;

use async_trait::async_trait;

use crate::error::Result;

pub use batch::{
    BatchFollowOrchestrator, BatchFollowOutcome, FollowResult, MAX_FOLLOWS_IN_FLIGHT,
    MAX_FOLLOW_BATCH, RATE_LIMIT_PAUSE,
};
pub use status::{FailSafePolicy, FollowStatusResolver, LIST_PAGE_SIZE};

/// Persistence collaborator that mirrors follow status.
///
/// Writes are best-effort: callers log failures and carry on.
#[async_trait]
pub trait FollowStatusSink: Send + Sync {
    /// Record whether `did` is followed under `collection`.
    async fn update_follow_status(&self, did: &str, collection: &str, following: bool) -> Result<()>;
}
