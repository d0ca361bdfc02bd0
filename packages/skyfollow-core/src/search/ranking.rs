//! Candidate scoring against an imported username.

use serde::{Deserialize, Serialize};

use crate::protocol::ActorView;

/// Candidates kept per username after ranking.
pub const MAX_RANKED_CANDIDATES: usize = 5;

/// A search hit with its match score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorCandidate {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 0 to 100
    pub match_score: u8,
}

impl ActorCandidate {
    fn scored(actor: ActorView, match_score: u8) -> Self {
        Self {
            did: actor.did,
            handle: actor.handle,
            display_name: actor.display_name,
            avatar: actor.avatar,
            description: actor.description,
            match_score,
        }
    }
}

/// Lowercase, trimmed, without a leading `@`.
pub fn normalize(value: &str) -> String {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('@')
        .unwrap_or(trimmed)
        .trim()
        .to_lowercase()
}

/// Score `actor` against an already-normalized query.
///
/// The first matching tier wins:
///
/// | Tier | Rule | Score |
/// |------|------|-------|
/// | 1 | handle local part equals query | 100 |
/// | 2 | full handle equals query | 90 |
/// | 3 | display name equals query | 80 |
/// | 4 | handle local part contains query | 60 |
/// | 5 | full handle contains query | 50 |
/// | 6 | display name contains query | 40 |
/// | 7 | query contains handle local part | 30 |
/// | - | otherwise | 0 |
pub fn score_candidate(query: &str, actor: &ActorView) -> u8 {
    if query.is_empty() {
        return 0;
    }

    let handle = normalize(&actor.handle);
    let local = handle.split('.').next().unwrap_or_default();
    let display = actor.display_name.as_deref().map(normalize).unwrap_or_default();

    if local == query {
        100
    } else if handle == query {
        90
    } else if !display.is_empty() && display == query {
        80
    } else if local.contains(query) {
        60
    } else if handle.contains(query) {
        50
    } else if display.contains(query) {
        40
    } else if !local.is_empty() && query.contains(local) {
        30
    } else {
        0
    }
}

/// Score, drop zero scores, sort descending (stable) and keep the top five.
pub fn rank(query: &str, actors: Vec<ActorView>) -> Vec<ActorCandidate> {
    let query = normalize(query);
    let mut ranked: Vec<ActorCandidate> = actors
        .into_iter()
        .filter_map(|actor| {
            let score = score_candidate(&query, &actor);
            (score > 0).then(|| ActorCandidate::scored(actor, score))
        })
        .collect();

    ranked.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    ranked.truncate(MAX_RANKED_CANDIDATES);
    ranked
}
