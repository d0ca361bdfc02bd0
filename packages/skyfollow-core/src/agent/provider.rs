//! Session id → restored agent, with a time-boxed agent cache.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ExpiringCache, MemoryCache};
use crate::config::AGENT_CACHE_TTL;
use crate::error::{Error, Result};
use crate::protocol::{AgentFactory, AtprotoAgent};
use crate::storage::UserSessionStore;

/// Cache of constructed agents, keyed by session and host.
pub type AgentCache = dyn ExpiringCache<Arc<dyn AtprotoAgent>>;

/// A restored agent and the identity it acts for.
#[derive(Clone)]
pub struct ResolvedAgent {
    pub agent: Arc<dyn AtprotoAgent>,
    pub did: String,
}

impl std::fmt::Debug for ResolvedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAgent")
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// Resolves user sessions into authenticated agents.
pub struct SessionAgentProvider {
    sessions: Arc<dyn UserSessionStore>,
    factory: Arc<dyn AgentFactory>,
    cache: Arc<AgentCache>,
    cache_ttl: Duration,
}

impl SessionAgentProvider {
    /// Create a provider with an in-process cache and the default TTL
    pub fn new(sessions: Arc<dyn UserSessionStore>, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            sessions,
            factory,
            cache: Arc::new(MemoryCache::<Arc<dyn AtprotoAgent>>::new()),
            cache_ttl: AGENT_CACHE_TTL,
        }
    }

    /// Use a different cache backing
    pub fn with_cache(mut self, cache: Arc<AgentCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Override how long constructed agents are reused
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Resolve `session_id` into a restored agent.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when the session is unknown or expired, or
    /// when the OAuth session cannot be restored. A failed restore evicts the
    /// cached agent so the next call starts from scratch.
    pub async fn resolve(&self, session_id: &str, host_context: &str) -> Result<ResolvedAgent> {
        let session = self
            .sessions
            .get_user_session(session_id)
            .await?
            .ok_or_else(|| Error::Authentication("invalid or expired session".into()))?;

        let key = cache_key(session_id, host_context);
        let agent = match self.cache.get(&key).await {
            Some(agent) => {
                tracing::debug!(did = %session.did, "Reusing cached agent");
                agent
            }
            None => {
                let agent = self.factory.create_agent(host_context).await?;
                self.cache.set(&key, Arc::clone(&agent), self.cache_ttl).await;
                tracing::debug!(did = %session.did, host = host_context, "Constructed agent");
                agent
            }
        };

        if let Err(e) = agent.restore_session(&session.did).await {
            tracing::warn!(did = %session.did, error = %e, "Session restore failed, evicting agent");
            self.cache.evict(&key).await;
            return Err(Error::Authentication("failed to restore session".into()));
        }

        Ok(ResolvedAgent {
            agent,
            did: session.did,
        })
    }

    /// Log out: revoke upstream (best effort), delete the session and evict
    /// its agent. Unknown sessions are a no-op.
    pub async fn revoke_and_delete(&self, session_id: &str, host_context: &str) -> Result<()> {
        let session = match self.sessions.get_user_session(session_id).await? {
            Some(session) => session,
            None => {
                tracing::debug!("Logout for unknown session, nothing to do");
                return Ok(());
            }
        };

        let key = cache_key(session_id, host_context);
        let agent = match self.cache.get(&key).await {
            Some(agent) => Some(agent),
            None => match self.factory.create_agent(host_context).await {
                Ok(agent) => Some(agent),
                Err(e) => {
                    tracing::warn!(did = %session.did, error = %e, "No agent for revocation");
                    None
                }
            },
        };

        if let Some(agent) = agent {
            if let Err(e) = agent.revoke_session(&session.did).await {
                tracing::warn!(did = %session.did, error = %e, "Session revocation failed");
            }
        }

        self.sessions.delete_user_session(session_id).await?;
        self.cache.evict(&key).await;

        tracing::info!(did = %session.did, "Session deleted");
        Ok(())
    }
}

fn cache_key(session_id: &str, host_context: &str) -> String {
    format!("{}|{}", host_context, session_id)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TokenVault;
    use crate::error::UpstreamError;
    use crate::mocks::{MockAgent, MockAgentFactory};
    use crate::storage::{CredentialStore, Database};

    const HOST: &str = "localhost";

    async fn sessions() -> Arc<CredentialStore> {
        let db = Database::open(None).await.unwrap();
        Arc::new(
            CredentialStore::new(db, Arc::new(TokenVault::disabled()))
                .with_read_retry_delays(Vec::new()),
        )
    }

    fn provider(
        sessions: Arc<CredentialStore>,
        factory: Arc<MockAgentFactory>,
    ) -> SessionAgentProvider {
        SessionAgentProvider::new(sessions, factory)
    }

    #[tokio::test]
    async fn test_unknown_session_is_authentication_error() {
        let factory = Arc::new(MockAgentFactory::new(Arc::new(MockAgent::new())));
        let provider = provider(sessions().await, factory.clone());

        let result = provider.resolve("missing", HOST).await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_resolve_reuses_cached_agent() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let agent = Arc::new(MockAgent::new());
        let factory = Arc::new(MockAgentFactory::new(agent.clone()));
        let provider = provider(sessions, factory.clone());

        let first = provider.resolve("s1", HOST).await.unwrap();
        let second = provider.resolve("s1", HOST).await.unwrap();

        assert_eq!(first.did, "did:plc:alice");
        assert_eq!(second.did, "did:plc:alice");
        assert_eq!(factory.created(), 1);
        // Every resolve restores, even with a cached agent
        assert_eq!(agent.restore_calls(), 2);
    }

    #[tokio::test]
    async fn test_host_context_is_part_of_the_key() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let factory = Arc::new(MockAgentFactory::new(Arc::new(MockAgent::new())));
        let provider = provider(sessions, factory.clone());

        provider.resolve("s1", "localhost").await.unwrap();
        provider.resolve("s1", "127.0.0.1").await.unwrap();
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_agent_expires() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let factory = Arc::new(MockAgentFactory::new(Arc::new(MockAgent::new())));
        let provider = provider(sessions, factory.clone());

        provider.resolve("s1", HOST).await.unwrap();
        tokio::time::advance(AGENT_CACHE_TTL + Duration::from_secs(1)).await;
        provider.resolve("s1", HOST).await.unwrap();

        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn test_restore_failure_evicts_and_fails() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let agent = Arc::new(
            MockAgent::new().with_restore_error(UpstreamError::Unknown("refresh rejected".into())),
        );
        let factory = Arc::new(MockAgentFactory::new(agent));
        let provider = provider(sessions, factory.clone());

        for _ in 0..2 {
            let result = provider.resolve("s1", HOST).await;
            match result {
                Err(Error::Authentication(msg)) => assert_eq!(msg, "failed to restore session"),
                other => panic!("expected authentication error, got {:?}", other),
            }
        }
        // Nothing stayed cached, so each attempt built a new agent
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn test_factory_failure_propagates() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let factory = Arc::new(MockAgentFactory::failing());
        let provider = provider(sessions, factory);

        assert!(matches!(
            provider.resolve("s1", HOST).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_revoke_and_delete() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let agent = Arc::new(MockAgent::new());
        let factory = Arc::new(MockAgentFactory::new(agent.clone()));
        let provider = provider(sessions.clone(), factory.clone());

        provider.resolve("s1", HOST).await.unwrap();
        provider.revoke_and_delete("s1", HOST).await.unwrap();

        assert_eq!(agent.revoke_calls(), 1);
        assert_eq!(factory.created(), 1);
        assert!(sessions.get_user_session("s1").await.unwrap().is_none());
        assert!(matches!(
            provider.resolve("s1", HOST).await,
            Err(Error::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_evicts_cached_agent() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let factory = Arc::new(MockAgentFactory::new(Arc::new(MockAgent::new())));
        let provider = provider(sessions.clone(), factory.clone());

        provider.resolve("s1", HOST).await.unwrap();
        provider.revoke_and_delete("s1", HOST).await.unwrap();

        // Signing in again under the same session id builds a fresh agent
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        provider.resolve("s1", HOST).await.unwrap();
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn test_revoke_failure_still_deletes() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let agent = Arc::new(
            MockAgent::new().with_revoke_error(UpstreamError::ServiceUnavailable("503".into())),
        );
        let provider = provider(sessions.clone(), Arc::new(MockAgentFactory::new(agent.clone())));

        provider.revoke_and_delete("s1", HOST).await.unwrap();

        assert_eq!(agent.revoke_calls(), 1);
        assert!(sessions.get_user_session("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_without_agent_still_deletes() {
        let sessions = sessions().await;
        sessions.set_user_session("s1", "did:plc:alice", "fp").await.unwrap();
        let provider = provider(sessions.clone(), Arc::new(MockAgentFactory::failing()));

        provider.revoke_and_delete("s1", HOST).await.unwrap();
        assert!(sessions.get_user_session("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let agent = Arc::new(MockAgent::new());
        let factory = Arc::new(MockAgentFactory::new(agent.clone()));
        let provider = provider(sessions().await, factory.clone());

        provider.revoke_and_delete("missing", HOST).await.unwrap();
        provider.revoke_and_delete("missing", HOST).await.unwrap();

        assert_eq!(agent.revoke_calls(), 0);
        assert_eq!(factory.created(), 0);
    }
}
