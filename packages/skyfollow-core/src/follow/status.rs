//! Follow-status resolution over the caller's own follow collection.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result, UpstreamError};
use crate::protocol::AtprotoAgent;

/// Records requested per listing call.
pub const LIST_PAGE_SIZE: u32 = 100;

/// What to report when the listing fails part-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailSafePolicy {
    /// Report every target as not followed. A false negative only risks a
    /// redundant follow attempt; a false positive would suppress one.
    #[default]
    AssumeNotFollowing,
    /// Propagate the upstream error.
    FailClosed,
}

/// Resolves which targets the caller already follows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowStatusResolver {
    policy: FailSafePolicy,
}

impl FollowStatusResolver {
    /// Create a resolver with an explicit failure policy
    pub fn new(policy: FailSafePolicy) -> Self {
        Self { policy }
    }

    /// The configured failure policy
    pub fn policy(&self) -> FailSafePolicy {
        self.policy
    }

    /// Map every distinct target to whether `self_did` follows it.
    ///
    /// Pages through `self_did`'s `collection` records and stops as soon as
    /// there is no next cursor or every target has been seen, so accounts
    /// with very large follow collections cost only the pages they need.
    pub async fn check_status(
        &self,
        agent: &dyn AtprotoAgent,
        self_did: &str,
        targets: &[String],
        collection: &str,
    ) -> Result<HashMap<String, bool>> {
        let mut status: HashMap<String, bool> =
            targets.iter().map(|did| (did.clone(), false)).collect();
        if status.is_empty() {
            return Ok(status);
        }

        let mut remaining: HashSet<&str> = targets.iter().map(String::as_str).collect();
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = match agent
                .list_records(self_did, collection, cursor.as_deref(), LIST_PAGE_SIZE)
                .await
            {
                Ok(page) => page,
                Err(e) => return self.listing_failed(self_did, targets, collection, pages, e),
            };
            pages += 1;

            for record in &page.records {
                if let Some(subject) = record.subject() {
                    if remaining.remove(subject) {
                        status.insert(subject.to_string(), true);
                    }
                }
            }

            cursor = page.cursor;
            if remaining.is_empty() {
                break;
            }
            match &cursor {
                None => break,
                // A cursor seen before would replay the same pages forever
                Some(next) if !seen_cursors.insert(next.clone()) => {
                    let stalled = UpstreamError::Unknown(format!(
                        "listing cursor {} repeated after {} pages",
                        next, pages
                    ));
                    return self.listing_failed(self_did, targets, collection, pages, stalled);
                }
                Some(_) => {}
            }
        }

        tracing::debug!(
            did = self_did,
            targets = status.len(),
            unresolved = remaining.len(),
            pages = pages,
            "Follow status resolved"
        );

        Ok(status)
    }

    fn listing_failed(
        &self,
        self_did: &str,
        targets: &[String],
        collection: &str,
        pages: u32,
        error: UpstreamError,
    ) -> Result<HashMap<String, bool>> {
        match self.policy {
            FailSafePolicy::AssumeNotFollowing => {
                tracing::warn!(
                    did = self_did,
                    collection = collection,
                    pages = pages,
                    error = %error,
                    "Follow listing failed, assuming not following"
                );
                Ok(targets.iter().map(|did| (did.clone(), false)).collect())
            }
            FailSafePolicy::FailClosed => Err(Error::Upstream(error)),
        }
    }

    /// The subset of `targets` already followed.
    pub async fn get_already_following(
        &self,
        agent: &dyn AtprotoAgent,
        self_did: &str,
        targets: &[String],
        collection: &str,
    ) -> Result<HashSet<String>> {
        let status = self.check_status(agent, self_did, targets, collection).await?;
        Ok(status
            .into_iter()
            .filter_map(|(did, following)| following.then_some(did))
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{follow_page, MockAgent};

    const FOLLOW: &str = "app.bsky.graph.follow";

    fn dids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_targets_make_no_calls() {
        let agent = MockAgent::new();
        let status = FollowStatusResolver::default()
            .check_status(&agent, "did:plc:me", &[], FOLLOW)
            .await
            .unwrap();

        assert!(status.is_empty());
        assert_eq!(agent.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_two_page_scenario() {
        let agent = MockAgent::new()
            .with_page(None, Ok(follow_page(&["a"], Some("p2"))))
            .with_page(Some("p2"), Ok(follow_page(&["c"], None)));

        let status = FollowStatusResolver::default()
            .check_status(&agent, "did:plc:me", &dids(&["a", "b", "c"]), FOLLOW)
            .await
            .unwrap();

        assert_eq!(status.len(), 3);
        assert_eq!(status["a"], true);
        assert_eq!(status["b"], false);
        assert_eq!(status["c"], true);
        assert_eq!(agent.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_early_exit_when_first_page_resolves_everything() {
        let agent = MockAgent::new()
            .with_page(None, Ok(follow_page(&["x", "a", "y", "b"], Some("p2"))))
            .with_page(Some("p2"), Err(UpstreamError::Unknown("should not be called".into())));

        let status = FollowStatusResolver::default()
            .check_status(&agent, "did:plc:me", &dids(&["a", "b"]), FOLLOW)
            .await
            .unwrap();

        assert!(status.values().all(|following| *following));
        assert_eq!(agent.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_listing_error_is_fail_safe() {
        let agent = MockAgent::new()
            .with_page(None, Ok(follow_page(&["a"], Some("p2"))))
            .with_page(Some("p2"), Err(UpstreamError::ServiceUnavailable("503".into())));

        let status = FollowStatusResolver::default()
            .check_status(&agent, "did:plc:me", &dids(&["a", "b"]), FOLLOW)
            .await
            .unwrap();

        // Even the target seen on page one reverts to false
        assert_eq!(status.len(), 2);
        assert!(status.values().all(|following| !*following));
    }

    #[tokio::test]
    async fn test_fail_closed_propagates() {
        let agent = MockAgent::new()
            .with_page(None, Err(UpstreamError::RateLimited("429".into())));

        let result = FollowStatusResolver::new(FailSafePolicy::FailClosed)
            .check_status(&agent, "did:plc:me", &dids(&["a"]), FOLLOW)
            .await;

        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::RateLimited(_)))
        ));
    }

    #[tokio::test]
    async fn test_repeating_cursor_stops_paging() {
        let agent = MockAgent::new()
            .with_page(None, Ok(follow_page(&["a"], Some("p"))))
            .with_page(Some("p"), Ok(follow_page(&[], Some("p"))));
        let targets = dids(&["a", "b"]);

        let status = FollowStatusResolver::default()
            .check_status(&agent, "did:plc:me", &targets, FOLLOW)
            .await
            .unwrap();
        assert!(status.values().all(|following| !*following));
        assert_eq!(agent.list_calls(), 2);

        let result = FollowStatusResolver::new(FailSafePolicy::FailClosed)
            .check_status(&agent, "did:plc:me", &targets, FOLLOW)
            .await;
        assert!(matches!(
            result,
            Err(Error::Upstream(UpstreamError::Unknown(_)))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_targets_collapse_to_one_key() {
        let agent = MockAgent::new().with_page(None, Ok(follow_page(&[], None)));

        let status = FollowStatusResolver::default()
            .check_status(&agent, "did:plc:me", &dids(&["a", "a", "b"]), FOLLOW)
            .await
            .unwrap();

        assert_eq!(status.len(), 2);
    }

    #[tokio::test]
    async fn test_already_following_matches_check_status() {
        let agent = MockAgent::new()
            .with_page(None, Ok(follow_page(&["a"], Some("p2"))))
            .with_page(Some("p2"), Ok(follow_page(&["c"], None)));
        let resolver = FollowStatusResolver::default();
        let targets = dids(&["a", "b", "c"]);

        let status = resolver
            .check_status(&agent, "did:plc:me", &targets, FOLLOW)
            .await
            .unwrap();
        let already = resolver
            .get_already_following(&agent, "did:plc:me", &targets, FOLLOW)
            .await
            .unwrap();

        let expected: HashSet<String> = status
            .into_iter()
            .filter(|(_, following)| *following)
            .map(|(did, _)| did)
            .collect();
        assert_eq!(already, expected);
        assert_eq!(already.len(), 2);
    }
}
