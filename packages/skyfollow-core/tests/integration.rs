//! End-to-end tests over a file-backed database and mock agents.

use std::sync::Arc;

use serde_json::json;
use skyfollow_core::config::{Environment, VaultConfig, FOLLOW_COLLECTION};
use skyfollow_core::mocks::{actor, follow_page, MockAgent, MockAgentFactory};
use skyfollow_core::storage::{OAuthSession, OAuthSessionStore, TokenSet, UserSessionStore};
use skyfollow_core::{
    BatchFollowOrchestrator, CredentialStore, Database, Error, FollowStatusResolver,
    SessionAgentProvider, SkyFollowService, TokenVault, UpstreamError,
};

const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn production_vault() -> TokenVault {
    TokenVault::from_config(&VaultConfig {
        key_hex: Some(KEY_HEX.to_string()),
        environment: Environment::Production,
    })
    .unwrap()
}

fn oauth_session(did: &str) -> OAuthSession {
    OAuthSession {
        did: did.to_string(),
        dpop_key: json!({"kty": "EC", "crv": "P-256"}),
        token_set: TokenSet {
            iss: "https://bsky.social".into(),
            sub: did.to_string(),
            aud: "https://pds.example.com".into(),
            scope: "atproto".into(),
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            token_type: "DPoP".into(),
            expires_at: None,
        },
        auth_method: "private_key_jwt".into(),
    }
}

#[tokio::test]
async fn credentials_survive_reopen_with_the_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skyfollow.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::open(Some(path)).await.unwrap();
        let store = CredentialStore::new(db, Arc::new(production_vault()));
        store
            .set_oauth_session("did:plc:alice", &oauth_session("did:plc:alice"))
            .await
            .unwrap();
        store
            .set_user_session("s1", "did:plc:alice", "fp")
            .await
            .unwrap();
    }

    let db = Database::open(Some(path)).await.unwrap();
    let store = CredentialStore::new(db.clone(), Arc::new(production_vault()));
    assert_eq!(
        store.get_oauth_session("did:plc:alice").await.unwrap(),
        Some(oauth_session("did:plc:alice"))
    );
    assert_eq!(
        store.get_user_session("s1").await.unwrap().map(|s| s.did),
        Some("did:plc:alice".to_string())
    );

    // A rotated key turns the stored credential into a miss
    let rotated = CredentialStore::new(db, Arc::new(TokenVault::new([7u8; 32])));
    assert!(rotated.get_oauth_session("did:plc:alice").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_key_is_fatal_only_in_production() {
    let production = VaultConfig {
        key_hex: None,
        environment: Environment::Production,
    };
    assert!(matches!(
        TokenVault::from_config(&production),
        Err(Error::Configuration(_))
    ));

    let development = VaultConfig::default();
    assert!(!TokenVault::from_config(&development).unwrap().is_enabled());
}

#[tokio::test(start_paused = true)]
async fn search_then_follow_mirrors_status() {
    let db = Database::open(None).await.unwrap();
    let sessions = Arc::new(
        CredentialStore::new(db.clone(), Arc::new(production_vault()))
            .with_read_retry_delays(Vec::new()),
    );
    sessions
        .set_user_session("s1", "did:plc:me", "fp")
        .await
        .unwrap();

    let agent = Arc::new(
        MockAgent::new()
            .with_search(
                "alice",
                Ok(vec![
                    actor("did:plc:alice", "alice.bsky.social", Some("Alice")),
                    actor("did:plc:carol", "carol.bsky.social", Some("Alice's friend")),
                ]),
            )
            .with_search("bob", Ok(vec![actor("did:plc:bob", "bob.bsky.social", None)]))
            .with_page(None, Ok(follow_page(&["did:plc:bob"], None)))
            .with_create_error(
                "did:plc:carol",
                UpstreamError::RateLimited("429 Too Many Requests".into()),
            ),
    );
    let provider = SessionAgentProvider::new(
        sessions,
        Arc::new(MockAgentFactory::new(agent.clone())),
    );
    let resolver = FollowStatusResolver::default();
    let service = SkyFollowService::new(
        Arc::new(provider),
        BatchFollowOrchestrator::new(resolver).with_sink(Arc::new(db.clone())),
        resolver,
        "localhost",
    );

    let usernames = vec!["alice".to_string(), "bob".to_string()];
    let results = service
        .search("s1", &usernames, FOLLOW_COLLECTION)
        .await
        .unwrap();

    let found: Vec<String> = results
        .iter()
        .flat_map(|r| r.actors.iter().map(|a| a.candidate.did.clone()))
        .collect();
    assert_eq!(found, vec!["did:plc:alice", "did:plc:carol", "did:plc:bob"]);
    assert_eq!(results[1].actors[0].follow_status[FOLLOW_COLLECTION], true);

    let outcome = service
        .follow("s1", &found, FOLLOW_COLLECTION)
        .await
        .unwrap();
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.already_following, 1);

    assert_eq!(
        db.get_follow_status("did:plc:alice", FOLLOW_COLLECTION).unwrap(),
        Some(true)
    );
    assert_eq!(
        db.get_follow_status("did:plc:bob", FOLLOW_COLLECTION).unwrap(),
        Some(true)
    );
    assert_eq!(
        db.get_follow_status("did:plc:carol", FOLLOW_COLLECTION).unwrap(),
        None
    );

    service.logout("s1").await.unwrap();
    assert_eq!(agent.revoke_calls(), 1);
}
