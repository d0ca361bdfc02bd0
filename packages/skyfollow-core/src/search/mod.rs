//! # Search Module
//!
//! Batch actor search with ranking and enrichment.
//!
//! ```text
//! usernames ──► search_actors(q, 20) per username (unbounded fan-out)
//!                   │ rank: tier ladder, drop 0, top 5
//!                   ▼
//!               union of candidate dids
//!                   │ get_profiles in batches of 25  → posts / followers
//!                   │ FollowStatusResolver once      → follow_status
//!                   ▼
//!               SearchResult per username, input order
//! ```

mod ranking;

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::follow::FollowStatusResolver;
use crate::protocol::{AtprotoAgent, ProfileStats};

pub use ranking::{normalize, rank, score_candidate, ActorCandidate, MAX_RANKED_CANDIDATES};

/// Candidates requested from the directory per username.
pub const SEARCH_LIMIT: u32 = 20;

/// Identities per profile fetch.
pub const PROFILE_BATCH_SIZE: usize = 25;

/// Largest accepted batch of usernames.
pub const MAX_SEARCH_BATCH: usize = 50;

/// A ranked candidate with profile statistics and follow status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedActor {
    #[serde(flatten)]
    pub candidate: ActorCandidate,
    pub posts_count: u64,
    pub followers_count: u64,
    /// Collection → followed
    pub follow_status: BTreeMap<String, bool>,
}

/// Search outcome for one imported username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub username: String,
    pub actors: Vec<EnrichedActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch-searches the directory and enriches the ranked matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActorSearchRanker {
    resolver: FollowStatusResolver,
}

impl ActorSearchRanker {
    pub fn new(resolver: FollowStatusResolver) -> Self {
        Self { resolver }
    }

    /// Search every username and return one result per username, in order.
    ///
    /// Per-username failures become an `error` entry; profile and follow
    /// status failures degrade to zeros and `false`. Only invalid input
    /// fails the call.
    pub async fn search_batch(
        &self,
        agent: &dyn AtprotoAgent,
        self_did: &str,
        usernames: &[String],
        collection: &str,
    ) -> Result<Vec<SearchResult>> {
        if usernames.is_empty() || usernames.len() > MAX_SEARCH_BATCH {
            return Err(Error::InvalidInput(format!(
                "batch search accepts 1 to {} usernames, got {}",
                MAX_SEARCH_BATCH,
                usernames.len()
            )));
        }

        let searches = usernames.iter().map(|username| search_one(agent, username));
        let ranked: Vec<std::result::Result<Vec<ActorCandidate>, String>> = join_all(searches).await;

        let mut seen: HashSet<&str> = HashSet::new();
        let mut dids: Vec<String> = Vec::new();
        for candidate in ranked.iter().filter_map(|outcome| outcome.as_ref().ok()).flatten() {
            if seen.insert(&candidate.did) {
                dids.push(candidate.did.clone());
            }
        }

        let stats = fetch_profile_stats(agent, &dids).await;
        let follow_status = match self
            .resolver
            .check_status(agent, self_did, &dids, collection)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(did = self_did, error = %e, "Follow status unavailable for search results");
                HashMap::new()
            }
        };

        let results: Vec<SearchResult> = usernames
            .iter()
            .zip(ranked)
            .map(|(username, outcome)| match outcome {
                Ok(candidates) => SearchResult {
                    username: username.clone(),
                    actors: candidates
                        .into_iter()
                        .map(|candidate| {
                            let profile = stats.get(&candidate.did);
                            let following =
                                follow_status.get(&candidate.did).copied().unwrap_or(false);
                            EnrichedActor {
                                posts_count: profile.map_or(0, |p| p.posts_count),
                                followers_count: profile.map_or(0, |p| p.followers_count),
                                follow_status: BTreeMap::from([(collection.to_string(), following)]),
                                candidate,
                            }
                        })
                        .collect(),
                    error: None,
                },
                Err(error) => SearchResult {
                    username: username.clone(),
                    actors: Vec::new(),
                    error: Some(error),
                },
            })
            .collect();

        tracing::info!(
            did = self_did,
            usernames = usernames.len(),
            candidates = dids.len(),
            "Batch search complete"
        );

        Ok(results)
    }
}

async fn search_one(
    agent: &dyn AtprotoAgent,
    username: &str,
) -> std::result::Result<Vec<ActorCandidate>, String> {
    let query = normalize(username);
    if query.is_empty() {
        return Err("empty username".to_string());
    }

    match agent.search_actors(&query, SEARCH_LIMIT).await {
        Ok(actors) => Ok(rank(&query, actors)),
        Err(e) => {
            tracing::warn!(username = username, error = %e, "Actor search failed");
            Err(e.to_string())
        }
    }
}

/// Profile statistics keyed by did. Failed batches are left out.
async fn fetch_profile_stats(
    agent: &dyn AtprotoAgent,
    dids: &[String],
) -> HashMap<String, ProfileStats> {
    let mut stats = HashMap::with_capacity(dids.len());
    for chunk in dids.chunks(PROFILE_BATCH_SIZE) {
        match agent.get_profiles(chunk).await {
            Ok(profiles) => {
                stats.extend(profiles.into_iter().map(|p| (p.did.clone(), p)));
            }
            Err(e) => {
                tracing::warn!(batch = chunk.len(), error = %e, "Profile batch failed");
            }
        }
    }
    stats
}
