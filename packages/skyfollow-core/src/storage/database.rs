//! # Database
//!
//! SQLite backing for credentials and the follow-status mirror.
//!
//! ```text
//! ┌─────────────────┐
//! │ CredentialStore │  Vault + retry policy
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Database     │  Row operations (this file)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    rusqlite     │  File for production, in-memory for tests
//! └─────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::schema;
use super::UserSession;
use crate::error::{Error, Result};
use crate::follow::FollowStatusSink;

/// The main database handle
#[derive(Clone)]
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub async fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!("Database schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v == schema::SCHEMA_VERSION => {
                tracing::debug!("Database schema version: {}", v);
            }
            Some(v) => {
                return Err(Error::DatabaseError(format!(
                    "Unsupported schema version {} (expected {})",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
        }

        Ok(())
    }

    // ========================================================================
    // OAUTH SESSIONS
    // ========================================================================

    /// Get the stored OAuth session document for a DID
    pub fn get_oauth_session(&self, did: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT data FROM oauth_sessions WHERE did = ?",
            params![did],
            |row| row.get(0),
        );

        match result {
            Ok(data) => Ok(Some(data)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!(
                "Failed to get OAuth session: {}",
                e
            ))),
        }
    }

    /// Insert or replace the OAuth session document for a DID
    pub fn put_oauth_session(&self, did: &str, data: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO oauth_sessions (did, data, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(did) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![did, data, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to store OAuth session: {}", e)))?;

        Ok(())
    }

    /// Delete the OAuth session for a DID
    pub fn delete_oauth_session(&self, did: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM oauth_sessions WHERE did = ?", params![did])
            .map_err(|e| Error::DatabaseError(format!("Failed to delete OAuth session: {}", e)))?;

        Ok(rows > 0)
    }

    // ========================================================================
    // USER SESSIONS
    // ========================================================================

    /// Get a user session that has not expired as of `now` (unix seconds)
    pub fn get_user_session(&self, session_id: &str, now: i64) -> Result<Option<UserSession>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT session_id, did, fingerprint, created_at, expires_at
             FROM user_sessions WHERE session_id = ? AND expires_at > ?",
            params![session_id, now],
            |row| {
                Ok(UserSession {
                    session_id: row.get(0)?,
                    did: row.get(1)?,
                    fingerprint: row.get(2)?,
                    created_at: row.get(3)?,
                    expires_at: row.get(4)?,
                })
            },
        );

        match result {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!(
                "Failed to get user session: {}",
                e
            ))),
        }
    }

    /// Insert or replace a user session
    pub fn put_user_session(&self, session: &UserSession) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT OR REPLACE INTO user_sessions (session_id, did, fingerprint, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                session.session_id,
                session.did,
                session.fingerprint,
                session.created_at,
                session.expires_at,
            ],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to store user session: {}", e)))?;

        Ok(())
    }

    /// Delete a user session
    pub fn delete_user_session(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM user_sessions WHERE session_id = ?",
                params![session_id],
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to delete user session: {}", e)))?;

        Ok(rows > 0)
    }

    // ========================================================================
    // FOLLOW STATUS MIRROR
    // ========================================================================

    /// Record whether `did` is followed under `collection`
    pub fn set_follow_status(&self, did: &str, collection: &str, following: bool) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO follow_status (did, collection, following, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(did, collection) DO UPDATE SET following = excluded.following, updated_at = excluded.updated_at",
            params![did, collection, following, now],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to store follow status: {}", e)))?;

        Ok(())
    }

    /// Read the mirrored follow status, if one was recorded
    pub fn get_follow_status(&self, did: &str, collection: &str) -> Result<Option<bool>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT following FROM follow_status WHERE did = ? AND collection = ?",
            params![did, collection],
            |row| row.get(0),
        );

        match result {
            Ok(following) => Ok(Some(following)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::DatabaseError(format!(
                "Failed to get follow status: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl FollowStatusSink for Database {
    async fn update_follow_status(&self, did: &str, collection: &str, following: bool) -> Result<()> {
        self.set_follow_status(did, collection, following)
    }
}

// ============================================================================
// TESTS
// ============================================================================
