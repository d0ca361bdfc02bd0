//! XRPC client for a user's PDS.
//!
//! Requests go to `{aud}/xrpc/<nsid>` with the stored access token. Token
//! refresh and DPoP proofs belong to the OAuth handshake layer; an expired
//! stored credential is reported as an upstream failure so the caller
//! re-authenticates.
//!
//! Only bearer tokens are sent. A DPoP-bound token needs a per-request proof
//! this client cannot produce, so such sessions fail before any request goes
//! out rather than being rejected by the PDS.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skyfollow_core::protocol::{ActorView, AgentFactory, AtprotoAgent, ProfileStats, RecordPage};
use skyfollow_core::storage::{OAuthSessionStore, TokenSet};
use skyfollow_core::{Error, Result, UpstreamError};
use tokio::sync::RwLock;

type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

#[derive(Deserialize)]
struct SearchActorsResponse {
    #[serde(default)]
    actors: Vec<ActorView>,
}

#[derive(Deserialize)]
struct GetProfilesResponse {
    #[serde(default)]
    profiles: Vec<ProfileStats>,
}

/// Map a non-success HTTP status onto the upstream taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> UpstreamError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited(message),
        StatusCode::SERVICE_UNAVAILABLE => UpstreamError::ServiceUnavailable(message),
        StatusCode::NOT_FOUND => UpstreamError::NotFound(message),
        _ => UpstreamError::Unknown(message),
    }
}

fn xrpc_url(service: &str, nsid: &str) -> String {
    format!("{}/xrpc/{}", service.trim_end_matches('/'), nsid)
}

/// An agent bound to one restored OAuth session.
pub struct XrpcAgent {
    http: Client,
    oauth: Arc<dyn OAuthSessionStore>,
    tokens: RwLock<Option<TokenSet>>,
}

impl XrpcAgent {
    pub fn new(http: Client, oauth: Arc<dyn OAuthSessionStore>) -> Self {
        Self {
            http,
            oauth,
            tokens: RwLock::new(None),
        }
    }

    async fn tokens(&self) -> UpstreamResult<TokenSet> {
        self.tokens
            .read()
            .await
            .clone()
            .ok_or_else(|| UpstreamError::Unknown("session not restored".into()))
    }

    async fn authorized(&self, builder: impl FnOnce(&str) -> RequestBuilder) -> UpstreamResult<RequestBuilder> {
        let tokens = self.tokens().await?;
        if tokens.token_type.eq_ignore_ascii_case("DPoP") {
            return Err(UpstreamError::Unknown(
                "DPoP-bound tokens need a proof, which this client does not send".into(),
            ));
        }
        Ok(builder(&tokens.aud).header(
            "Authorization",
            format!("{} {}", tokens.token_type, tokens.access_token),
        ))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> UpstreamResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unknown(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Unknown(format!("Invalid response: {}", e)))
    }
}

#[async_trait]
impl AtprotoAgent for XrpcAgent {
    async fn search_actors(&self, query: &str, limit: u32) -> UpstreamResult<Vec<ActorView>> {
        let request = self
            .authorized(|service| {
                self.http
                    .get(xrpc_url(service, "app.bsky.actor.searchActors"))
                    .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            })
            .await?;
        let response: SearchActorsResponse = self.send(request).await?;
        Ok(response.actors)
    }

    async fn get_profiles(&self, actors: &[String]) -> UpstreamResult<Vec<ProfileStats>> {
        let params: Vec<(&str, &str)> = actors.iter().map(|did| ("actors", did.as_str())).collect();
        let request = self
            .authorized(|service| {
                self.http
                    .get(xrpc_url(service, "app.bsky.actor.getProfiles"))
                    .query(&params)
            })
            .await?;
        let response: GetProfilesResponse = self.send(request).await?;
        Ok(response.profiles)
    }

    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> UpstreamResult<RecordPage> {
        let mut params = vec![
            ("repo", repo.to_string()),
            ("collection", collection.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        let request = self
            .authorized(|service| {
                self.http
                    .get(xrpc_url(service, "com.atproto.repo.listRecords"))
                    .query(&params)
            })
            .await?;
        self.send(request).await
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: serde_json::Value,
    ) -> UpstreamResult<()> {
        let request = self
            .authorized(|service| {
                self.http
                    .post(xrpc_url(service, "com.atproto.repo.createRecord"))
                    .json(&serde_json::json!({
                        "repo": repo,
                        "collection": collection,
                        "record": record,
                    }))
            })
            .await?;
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    async fn restore_session(&self, did: &str) -> UpstreamResult<()> {
        let session = self
            .oauth
            .get_oauth_session(did)
            .await
            .map_err(|e| UpstreamError::Unknown(e.to_string()))?
            .ok_or_else(|| UpstreamError::Unknown(format!("no OAuth session for {}", did)))?;

        if session.token_set.is_expired(Utc::now()) {
            return Err(UpstreamError::Unknown(format!(
                "OAuth session for {} has expired",
                did
            )));
        }

        *self.tokens.write().await = Some(session.token_set);
        tracing::debug!(did = did, "OAuth session restored");
        Ok(())
    }

    async fn revoke_session(&self, did: &str) -> UpstreamResult<()> {
        let stored = match self.tokens().await {
            Ok(tokens) => Some(tokens),
            Err(_) => self
                .oauth
                .get_oauth_session(did)
                .await
                .map_err(|e| UpstreamError::Unknown(e.to_string()))?
                .map(|session| session.token_set),
        };

        let outcome = match &stored {
            Some(tokens) => {
                let token = tokens.refresh_token.as_deref().unwrap_or(&tokens.access_token);
                let hint = if tokens.refresh_token.is_some() {
                    "refresh_token"
                } else {
                    "access_token"
                };
                let response = self
                    .http
                    .post(format!("{}/oauth/revoke", tokens.iss.trim_end_matches('/')))
                    .form(&[("token", token), ("token_type_hint", hint)])
                    .send()
                    .await;
                match response {
                    Ok(resp) if resp.status().is_success() => Ok(()),
                    Ok(resp) => {
                        let status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        Err(classify_status(status, &body))
                    }
                    Err(e) => Err(UpstreamError::Unknown(e.to_string())),
                }
            }
            None => Ok(()),
        };

        self.oauth
            .delete_oauth_session(did)
            .await
            .map_err(|e| UpstreamError::Unknown(e.to_string()))?;
        *self.tokens.write().await = None;

        outcome
    }
}

/// Builds [`XrpcAgent`]s that share one HTTP client and OAuth store.
pub struct XrpcAgentFactory {
    http: Client,
    oauth: Arc<dyn OAuthSessionStore>,
}

impl XrpcAgentFactory {
    pub fn new(http: Client, oauth: Arc<dyn OAuthSessionStore>) -> Self {
        Self { http, oauth }
    }
}

#[async_trait]
impl AgentFactory for XrpcAgentFactory {
    async fn create_agent(&self, host_context: &str) -> Result<Arc<dyn AtprotoAgent>> {
        if host_context.trim().is_empty() {
            return Err(Error::Configuration("host context is empty".into()));
        }
        tracing::debug!(host = host_context, "Creating XRPC agent");
        Ok(Arc::new(XrpcAgent::new(self.http.clone(), Arc::clone(&self.oauth))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use skyfollow_core::storage::{CredentialStore, Database, OAuthSession};
    use skyfollow_core::TokenVault;

    fn token_set(expires_in: Option<Duration>) -> TokenSet {
        TokenSet {
            token_type: "DPoP".into(),
            ..bearer_token_set(expires_in)
        }
    }

    fn bearer_token_set(expires_in: Option<Duration>) -> TokenSet {
        TokenSet {
            iss: "https://bsky.social".into(),
            sub: "did:plc:alice".into(),
            aud: "https://pds.example.com".into(),
            scope: "atproto".into(),
            access_token: "at".into(),
            refresh_token: None,
            token_type: "Bearer".into(),
            expires_at: expires_in.map(|d| Utc::now() + d),
        }
    }

    async fn store_with(tokens: Option<TokenSet>) -> Arc<CredentialStore> {
        let db = Database::open(None).await.unwrap();
        let store = Arc::new(CredentialStore::new(db, Arc::new(TokenVault::new([4u8; 32]))));
        if let Some(token_set) = tokens {
            store
                .set_oauth_session(
                    "did:plc:alice",
                    &OAuthSession {
                        did: "did:plc:alice".into(),
                        dpop_key: json!({}),
                        token_set,
                        auth_method: "none".into(),
                    },
                )
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            UpstreamError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            UpstreamError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            UpstreamError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "{\"error\":\"InvalidRequest\"}"),
            UpstreamError::Unknown(msg) if msg.contains("InvalidRequest")
        ));
    }

    #[test]
    fn test_xrpc_url() {
        assert_eq!(
            xrpc_url("https://pds.example.com/", "com.atproto.repo.listRecords"),
            "https://pds.example.com/xrpc/com.atproto.repo.listRecords"
        );
    }

    #[tokio::test]
    async fn test_restore_requires_stored_session() {
        let agent = XrpcAgent::new(Client::new(), store_with(None).await);
        assert!(matches!(
            agent.restore_session("did:plc:alice").await,
            Err(UpstreamError::Unknown(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_rejects_expired_session() {
        let store = store_with(Some(token_set(Some(Duration::seconds(-60))))).await;
        let agent = XrpcAgent::new(Client::new(), store);
        assert!(agent.restore_session("did:plc:alice").await.is_err());
    }

    #[tokio::test]
    async fn test_restore_loads_tokens() {
        let store = store_with(Some(token_set(Some(Duration::hours(1))))).await;
        let agent = XrpcAgent::new(Client::new(), store);

        assert!(matches!(agent.tokens().await, Err(UpstreamError::Unknown(_))));
        agent.restore_session("did:plc:alice").await.unwrap();
        assert_eq!(agent.tokens().await.unwrap().aud, "https://pds.example.com");
    }

    #[tokio::test]
    async fn test_calls_before_restore_fail() {
        let agent = XrpcAgent::new(Client::new(), store_with(None).await);
        assert!(agent.search_actors("alice", 20).await.is_err());
    }

    #[tokio::test]
    async fn test_only_bearer_tokens_are_sent() {
        let http = Client::new();
        let request = |service: &str| http.get(xrpc_url(service, "app.bsky.actor.searchActors"));

        let bearer = store_with(Some(bearer_token_set(Some(Duration::hours(1))))).await;
        let agent = XrpcAgent::new(Client::new(), bearer);
        agent.restore_session("did:plc:alice").await.unwrap();
        assert!(agent.authorized(request).await.is_ok());

        let dpop = store_with(Some(token_set(Some(Duration::hours(1))))).await;
        let agent = XrpcAgent::new(Client::new(), dpop);
        agent.restore_session("did:plc:alice").await.unwrap();
        assert!(matches!(
            agent.authorized(request).await,
            Err(UpstreamError::Unknown(msg)) if msg.contains("DPoP")
        ));
    }

    #[tokio::test]
    async fn test_factory_rejects_empty_host() {
        let factory = XrpcAgentFactory::new(Client::new(), store_with(None).await);
        assert!(matches!(
            factory.create_agent(" ").await,
            Err(Error::Configuration(_))
        ));
        assert!(factory.create_agent("localhost").await.is_ok());
    }
}
