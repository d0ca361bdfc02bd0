//! Database schema definitions.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Long-lived OAuth sessions, one per identity.
-- `data` is a JSON document; its token_set may be a sealed vault blob.
CREATE TABLE IF NOT EXISTS oauth_sessions (
    did TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Short-lived user sessions (opaque session id -> identity).
CREATE TABLE IF NOT EXISTS user_sessions (
    session_id TEXT PRIMARY KEY,
    did TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_user_sessions_did ON user_sessions(did);
CREATE INDEX IF NOT EXISTS idx_user_sessions_expires ON user_sessions(expires_at);

-- Mirror of follow relationships observed or created by the core.
CREATE TABLE IF NOT EXISTS follow_status (
    did TEXT NOT NULL,
    collection TEXT NOT NULL,
    following INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (did, collection)
);
"#;
