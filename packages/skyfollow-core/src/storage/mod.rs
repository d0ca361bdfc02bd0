//! # Storage Module
//!
//! Persisted credentials.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CREDENTIAL STORES                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  OAuthSessionStore (long-lived)      UserSessionStore (7 days)         │
//! │  ─────────────────────────────       ─────────────────────────         │
//! │  did → { dpop_key,                   session_id → { did,               │
//! │          token_set (sealed),                        fingerprint,       │
//! │          auth_method }                              expires_at }       │
//! │                                                                         │
//! │  Both are implemented by CredentialStore on top of Database.           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod credentials;
mod database;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use credentials::CredentialStore;
pub use database::Database;

/// OAuth token set issued by the authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Authorization server issuer URL
    pub iss: String,
    /// Subject (the account DID)
    pub sub: String,
    /// Audience (the account's PDS URL)
    pub aud: String,
    pub scope: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `DPoP` or `Bearer`
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Whether the access token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A long-lived OAuth session for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthSession {
    pub did: String,
    /// DPoP private key (JWK). Stored in plaintext next to the sealed tokens.
    pub dpop_key: serde_json::Value,
    pub token_set: TokenSet,
    /// Client authentication method used at the token endpoint
    pub auth_method: String,
}

/// A short-lived browser/user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Opaque, unguessable identifier
    pub session_id: String,
    pub did: String,
    pub fingerprint: String,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

/// Identity → OAuth session.
#[async_trait]
pub trait OAuthSessionStore: Send + Sync {
    /// Load the session; an unreadable or undecryptable row is a miss.
    async fn get_oauth_session(&self, did: &str) -> Result<Option<OAuthSession>>;

    /// Store or replace the session.
    async fn set_oauth_session(&self, did: &str, session: &OAuthSession) -> Result<()>;

    /// Remove the session.
    async fn delete_oauth_session(&self, did: &str) -> Result<()>;
}

/// Session id → identity.
#[async_trait]
pub trait UserSessionStore: Send + Sync {
    /// Look up a non-expired session.
    async fn get_user_session(&self, session_id: &str) -> Result<Option<UserSession>>;

    /// Create or replace a session with the standard expiry.
    async fn set_user_session(
        &self,
        session_id: &str,
        did: &str,
        fingerprint: &str,
    ) -> Result<UserSession>;

    /// Remove a session.
    async fn delete_user_session(&self, session_id: &str) -> Result<()>;
}
