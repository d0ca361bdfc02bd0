//! Session-scoped entry points that wire the components together.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::SessionAgentProvider;
use crate::error::{Error, Result};
use crate::follow::{BatchFollowOrchestrator, BatchFollowOutcome, FollowStatusResolver};
use crate::search::{ActorSearchRanker, SearchResult};

/// Largest accepted status check.
pub const MAX_STATUS_BATCH: usize = 100;

/// The operations a route layer or CLI calls with a user session id.
pub struct SkyFollowService {
    provider: Arc<SessionAgentProvider>,
    resolver: FollowStatusResolver,
    ranker: ActorSearchRanker,
    orchestrator: BatchFollowOrchestrator,
    host_context: String,
}

impl SkyFollowService {
    pub fn new(
        provider: Arc<SessionAgentProvider>,
        orchestrator: BatchFollowOrchestrator,
        resolver: FollowStatusResolver,
        host_context: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            resolver,
            ranker: ActorSearchRanker::new(resolver),
            orchestrator,
            host_context: host_context.into(),
        }
    }

    /// Batch search on behalf of `session_id`.
    pub async fn search(
        &self,
        session_id: &str,
        usernames: &[String],
        collection: &str,
    ) -> Result<Vec<SearchResult>> {
        let resolved = self.provider.resolve(session_id, &self.host_context).await?;
        self.ranker
            .search_batch(resolved.agent.as_ref(), &resolved.did, usernames, collection)
            .await
    }

    /// Batch follow on behalf of `session_id`.
    pub async fn follow(
        &self,
        session_id: &str,
        dids: &[String],
        collection: &str,
    ) -> Result<BatchFollowOutcome> {
        let resolved = self.provider.resolve(session_id, &self.host_context).await?;
        self.orchestrator
            .follow_batch(resolved.agent.as_ref(), &resolved.did, dids, collection)
            .await
    }

    /// Follow status of `dids` for the session's identity.
    pub async fn check_status(
        &self,
        session_id: &str,
        dids: &[String],
        collection: &str,
    ) -> Result<HashMap<String, bool>> {
        if dids.is_empty() || dids.len() > MAX_STATUS_BATCH {
            return Err(Error::InvalidInput(format!(
                "status check accepts 1 to {} identities, got {}",
                MAX_STATUS_BATCH,
                dids.len()
            )));
        }
        let resolved = self.provider.resolve(session_id, &self.host_context).await?;
        self.resolver
            .check_status(resolved.agent.as_ref(), &resolved.did, dids, collection)
            .await
    }

    /// Revoke and delete the session. Unknown sessions are a no-op.
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        self.provider
            .revoke_and_delete(session_id, &self.host_context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FOLLOW_COLLECTION;
    use crate::crypto::TokenVault;
    use crate::mocks::{actor, follow_page, MockAgent, MockAgentFactory};
    use crate::storage::{CredentialStore, Database, UserSessionStore};

    async fn service(agent: MockAgent) -> (SkyFollowService, Arc<MockAgent>) {
        let db = Database::open(None).await.unwrap();
        let sessions = Arc::new(
            CredentialStore::new(db, Arc::new(TokenVault::disabled()))
                .with_read_retry_delays(Vec::new()),
        );
        sessions
            .set_user_session("s1", "did:plc:me", "fp")
            .await
            .unwrap();

        let agent = Arc::new(agent);
        let provider = SessionAgentProvider::new(
            sessions,
            Arc::new(MockAgentFactory::new(agent.clone())),
        );
        let resolver = FollowStatusResolver::default();
        let service = SkyFollowService::new(
            Arc::new(provider),
            BatchFollowOrchestrator::new(resolver),
            resolver,
            "localhost",
        );
        (service, agent)
    }

    #[tokio::test]
    async fn test_operations_run_as_the_session_identity() {
        let (service, agent) = service(
            MockAgent::new()
                .with_search("alice", Ok(vec![actor("did:plc:alice", "alice.bsky.social", None)]))
                .with_page(None, Ok(follow_page(&["did:plc:alice"], None))),
        )
        .await;

        let results = service
            .search("s1", &["alice".to_string()], FOLLOW_COLLECTION)
            .await
            .unwrap();
        assert_eq!(results[0].actors[0].follow_status[FOLLOW_COLLECTION], true);

        let status = service
            .check_status("s1", &["did:plc:alice".to_string()], FOLLOW_COLLECTION)
            .await
            .unwrap();
        assert_eq!(status.get("did:plc:alice"), Some(&true));

        let outcome = service
            .follow("s1", &["did:plc:bob".to_string()], FOLLOW_COLLECTION)
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(agent.created_records()[0].0, "did:plc:me");
    }

    #[tokio::test]
    async fn test_unknown_session_rejected_everywhere() {
        let (service, _) = service(MockAgent::new()).await;
        let dids = vec!["did:plc:alice".to_string()];

        assert!(matches!(
            service.check_status("nope", &dids, FOLLOW_COLLECTION).await,
            Err(Error::Authentication(_))
        ));
        assert!(matches!(
            service.follow("nope", &dids, FOLLOW_COLLECTION).await,
            Err(Error::Authentication(_))
        ));
        service.logout("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_status_batch_bounds() {
        let (service, _) = service(MockAgent::new()).await;
        assert!(matches!(
            service.check_status("s1", &[], FOLLOW_COLLECTION).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_ends_the_session() {
        let (service, agent) = service(MockAgent::new()).await;
        service.logout("s1").await.unwrap();

        assert_eq!(agent.revoke_calls(), 1);
        assert!(matches!(
            service.search("s1", &["alice".to_string()], FOLLOW_COLLECTION).await,
            Err(Error::Authentication(_))
        ));
    }
}
