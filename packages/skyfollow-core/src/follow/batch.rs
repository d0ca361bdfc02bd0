//! Batch follow mutation with a bounded number of in-flight calls.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::{FollowStatusResolver, FollowStatusSink};
use crate::error::{Error, Result};
use crate::protocol::{AtprotoAgent, FollowRecord};

/// Upper bound on create-record calls in flight at once.
pub const MAX_FOLLOWS_IN_FLIGHT: usize = 5;

/// How long a rate-limited attempt holds its slot before reporting failure.
pub const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

/// Largest accepted batch.
pub const MAX_FOLLOW_BATCH: usize = 100;

/// Outcome for one requested identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResult {
    pub did: String,
    pub success: bool,
    pub already_following: bool,
    pub error: Option<String>,
}

/// Aggregate of a batch. `succeeded + failed == total` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFollowOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub already_following: usize,
    /// One entry per requested identity, in request order.
    pub results: Vec<FollowResult>,
}

impl BatchFollowOutcome {
    fn from_results(results: Vec<FollowResult>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let already_following = results.iter().filter(|r| r.already_following).count();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
            already_following,
            results,
        }
    }
}

/// Issues follow mutations for a batch of identities.
///
/// Slots refill continuously: a new call starts as soon as any in-flight
/// call settles, never exceeding the configured bound.
pub struct BatchFollowOrchestrator {
    resolver: FollowStatusResolver,
    sink: Option<Arc<dyn FollowStatusSink>>,
    max_in_flight: usize,
    rate_limit_pause: Duration,
}

impl BatchFollowOrchestrator {
    /// Create an orchestrator with the default bound and pause
    pub fn new(resolver: FollowStatusResolver) -> Self {
        Self {
            resolver,
            sink: None,
            max_in_flight: MAX_FOLLOWS_IN_FLIGHT,
            rate_limit_pause: RATE_LIMIT_PAUSE,
        }
    }

    /// Mirror follow status into a persistence sink
    pub fn with_sink(mut self, sink: Arc<dyn FollowStatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the in-flight bound (minimum 1)
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Override the rate-limit pause
    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    /// Follow every identity in `targets` on behalf of `self_did`.
    ///
    /// Fails only on invalid input, or when the status resolver runs with
    /// [`FailSafePolicy::FailClosed`](super::FailSafePolicy) and the listing
    /// fails. Per-target failures land in the results.
    pub async fn follow_batch(
        &self,
        agent: &dyn AtprotoAgent,
        self_did: &str,
        targets: &[String],
        collection: &str,
    ) -> Result<BatchFollowOutcome> {
        if targets.is_empty() || targets.len() > MAX_FOLLOW_BATCH {
            return Err(Error::InvalidInput(format!(
                "batch follow accepts 1 to {} identities, got {}",
                MAX_FOLLOW_BATCH,
                targets.len()
            )));
        }

        let already = self
            .resolver
            .get_already_following(agent, self_did, targets, collection)
            .await?;

        let results: Vec<FollowResult> = stream::iter(targets)
            .map(|did| self.follow_one(agent, self_did, did, collection, already.contains(did)))
            .buffered(self.max_in_flight)
            .collect()
            .await;

        let outcome = BatchFollowOutcome::from_results(results);

        tracing::info!(
            did = self_did,
            total = outcome.total,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            already_following = outcome.already_following,
            "Batch follow complete"
        );

        Ok(outcome)
    }

    async fn follow_one(
        &self,
        agent: &dyn AtprotoAgent,
        self_did: &str,
        did: &str,
        collection: &str,
        already_following: bool,
    ) -> FollowResult {
        if already_following {
            self.mirror(did, collection).await;
            return FollowResult {
                did: did.to_string(),
                success: true,
                already_following: true,
                error: None,
            };
        }

        let record = match serde_json::to_value(FollowRecord::new(collection, did, Utc::now())) {
            Ok(record) => record,
            Err(e) => return failed(did, e.to_string()),
        };

        match agent.create_record(self_did, collection, record).await {
            Ok(()) => {
                self.mirror(did, collection).await;
                FollowResult {
                    did: did.to_string(),
                    success: true,
                    already_following: false,
                    error: None,
                }
            }
            Err(e) if e.is_rate_limited() => {
                tracing::warn!(target_did = did, error = %e, "Follow rate limited, pausing");
                tokio::time::sleep(self.rate_limit_pause).await;
                failed(did, e.to_string())
            }
            Err(e) => {
                tracing::warn!(target_did = did, error = %e, "Follow failed");
                failed(did, e.to_string())
            }
        }
    }

    async fn mirror(&self, did: &str, collection: &str) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.update_follow_status(did, collection, true).await {
                tracing::warn!(target_did = did, error = %e, "Failed to mirror follow status");
            }
        }
    }
}

fn failed(did: &str, error: String) -> FollowResult {
    FollowResult {
        did: did.to_string(),
        success: false,
        already_following: false,
        error: Some(error),
    }
}

// ============================================================================
// TESTS
// ============================================================================
