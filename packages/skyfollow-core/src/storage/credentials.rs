//! Credential store: vault-sealed OAuth sessions and user sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{Database, OAuthSession, OAuthSessionStore, TokenSet, UserSession, UserSessionStore};
use crate::config::USER_SESSION_TTL_SECS;
use crate::crypto::TokenVault;
use crate::error::{Error, Result};

/// Delays between user-session read attempts. A replicated backing store
/// can lag behind a session that was written moments ago.
const DEFAULT_READ_RETRY_DELAYS: [Duration; 2] =
    [Duration::from_millis(100), Duration::from_millis(300)];

/// On-disk OAuth session document.
///
/// When `encrypted` is set, `token_set` holds a vault blob string instead of
/// the token set object.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredOAuthSession {
    dpop_key: serde_json::Value,
    auth_method: String,
    #[serde(default)]
    encrypted: bool,
    token_set: serde_json::Value,
}

/// Credential store backed by [`Database`].
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
    vault: Arc<TokenVault>,
    read_retry_delays: Vec<Duration>,
}

impl CredentialStore {
    /// Create a store using the default retry schedule
    pub fn new(db: Database, vault: Arc<TokenVault>) -> Self {
        Self {
            db,
            vault,
            read_retry_delays: DEFAULT_READ_RETRY_DELAYS.to_vec(),
        }
    }

    /// Override the delays between user-session read attempts
    pub fn with_read_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.read_retry_delays = delays;
        self
    }

    fn seal(&self, session: &OAuthSession) -> Result<String> {
        let stored = if self.vault.is_enabled() {
            StoredOAuthSession {
                dpop_key: session.dpop_key.clone(),
                auth_method: session.auth_method.clone(),
                encrypted: true,
                token_set: serde_json::Value::String(self.vault.encrypt(&session.token_set)?),
            }
        } else {
            StoredOAuthSession {
                dpop_key: session.dpop_key.clone(),
                auth_method: session.auth_method.clone(),
                encrypted: false,
                token_set: serde_json::to_value(&session.token_set)?,
            }
        };
        Ok(serde_json::to_string(&stored)?)
    }

    fn open(&self, did: &str, data: &str) -> Result<OAuthSession> {
        let stored: StoredOAuthSession = serde_json::from_str(data)
            .map_err(|e| Error::StorageCorrupted(format!("OAuth session for {}: {}", did, e)))?;

        let token_set: TokenSet = if stored.encrypted {
            let blob = stored.token_set.as_str().ok_or_else(|| {
                Error::DecryptionFailed("sealed token set is not a string".into())
            })?;
            self.vault.decrypt(blob)?
        } else {
            serde_json::from_value(stored.token_set)
                .map_err(|e| Error::StorageCorrupted(format!("OAuth session for {}: {}", did, e)))?
        };

        Ok(OAuthSession {
            did: did.to_string(),
            dpop_key: stored.dpop_key,
            token_set,
            auth_method: stored.auth_method,
        })
    }
}

#[async_trait]
impl OAuthSessionStore for CredentialStore {
    async fn get_oauth_session(&self, did: &str) -> Result<Option<OAuthSession>> {
        let data = match self.db.get_oauth_session(did)? {
            Some(data) => data,
            None => return Ok(None),
        };

        match self.open(did, &data) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // Unreadable credentials force a fresh sign-in
                tracing::warn!(did = did, error = %e, "Stored OAuth session unreadable, treating as missing");
                Ok(None)
            }
        }
    }

    async fn set_oauth_session(&self, did: &str, session: &OAuthSession) -> Result<()> {
        let data = self.seal(session)?;
        self.db.put_oauth_session(did, &data)?;
        tracing::debug!(did = did, encrypted = self.vault.is_enabled(), "OAuth session stored");
        Ok(())
    }

    async fn delete_oauth_session(&self, did: &str) -> Result<()> {
        self.db.delete_oauth_session(did)?;
        Ok(())
    }
}

#[async_trait]
impl UserSessionStore for CredentialStore {
    async fn get_user_session(&self, session_id: &str) -> Result<Option<UserSession>> {
        let mut delays = self.read_retry_delays.iter();
        loop {
            let outcome = self.db.get_user_session(session_id, Utc::now().timestamp());
            let retryable = matches!(outcome, Ok(None) | Err(_));

            match delays.next() {
                Some(delay) if retryable => {
                    if let Err(ref e) = outcome {
                        tracing::debug!(error = %e, "User session read failed, retrying");
                    }
                    tokio::time::sleep(*delay).await;
                }
                _ => return outcome,
            }
        }
    }

    async fn set_user_session(
        &self,
        session_id: &str,
        did: &str,
        fingerprint: &str,
    ) -> Result<UserSession> {
        let now = Utc::now().timestamp();
        let session = UserSession {
            session_id: session_id.to_string(),
            did: did.to_string(),
            fingerprint: fingerprint.to_string(),
            created_at: now,
            expires_at: now + USER_SESSION_TTL_SECS,
        };
        self.db.put_user_session(&session)?;
        Ok(session)
    }

    async fn delete_user_session(&self, session_id: &str) -> Result<()> {
        self.db.delete_user_session(session_id)?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
