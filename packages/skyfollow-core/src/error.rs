//! # Error Handling
//!
//! Error types for SkyFollow Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Authentication (100-199)                                          │
//! │  │   └── Authentication        - No/expired session, restore failed    │
//! │  │                                                                      │
//! │  ├── Configuration (200-299)                                           │
//! │  │   └── Configuration         - Missing or malformed vault key        │
//! │  │                                                                      │
//! │  ├── Crypto (300-399)                                                  │
//! │  │   ├── EncryptionFailed      - Token set could not be sealed         │
//! │  │   └── DecryptionFailed      - Tampered, malformed or wrong key      │
//! │  │                                                                      │
//! │  ├── Storage (400-499)                                                 │
//! │  │   ├── DatabaseError         - SQLite failure                        │
//! │  │   └── StorageCorrupted      - Stored document unreadable            │
//! │  │                                                                      │
//! │  ├── Upstream (500-599)                                                │
//! │  │   └── Upstream(UpstreamError)                                       │
//! │  │       ├── RateLimited                                               │
//! │  │       ├── ServiceUnavailable                                        │
//! │  │       ├── NotFound                                                  │
//! │  │       └── Unknown                                                   │
//! │  │                                                                      │
//! │  ├── Request (600-699)                                                 │
//! │  │   └── InvalidInput          - Batch size out of bounds              │
//! │  │                                                                      │
//! │  └── Internal (900-999)                                                │
//! │      ├── SerializationError                                            │
//! │      └── Internal                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session and credential failures terminate a whole request. Upstream
//! failures during batch search or batch follow are caught at the item
//! boundary and turned into result fields instead.

use thiserror::Error;

/// Result type alias for SkyFollow Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for SkyFollow Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Authentication Errors (100-199)
    // ========================================================================

    /// No valid session, or the remote session could not be restored
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // ========================================================================
    // Configuration Errors (200-299)
    // ========================================================================

    /// Missing or malformed configuration (encryption key)
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored document could not be parsed
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    // ========================================================================
    // Upstream Errors (500-599)
    // ========================================================================

    /// The remote directory/protocol service failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    // ========================================================================
    // Request Errors (600-699)
    // ========================================================================

    /// Caller supplied an out-of-bounds or empty batch
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure reported by the remote protocol adapter.
///
/// The adapter classifies transport failures once, from the HTTP status, so
/// callers branch on the variant rather than on message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The service refused the call because of rate limiting (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The service is temporarily unavailable (HTTP 503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The requested actor or record does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else
    #[error("Upstream error: {0}")]
    Unknown(String),
}

impl UpstreamError {
    /// True for the rate-limit variant
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited(_))
    }
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Authentication
    /// - 200-299: Configuration
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 500-599: Upstream
    /// - 600-699: Request
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::Authentication(_) => 100,

            Error::Configuration(_) => 200,

            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed(_) => 301,

            Error::DatabaseError(_) => 400,
            Error::StorageCorrupted(_) => 401,

            Error::Upstream(UpstreamError::RateLimited(_)) => 500,
            Error::Upstream(UpstreamError::ServiceUnavailable(_)) => 501,
            Error::Upstream(UpstreamError::NotFound(_)) => 502,
            Error::Upstream(UpstreamError::Unknown(_)) => 503,

            Error::InvalidInput(_) => 600,

            Error::SerializationError(_) => 900,
            Error::Internal(_) => 901,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors may succeed if the caller tries again later.
    /// Authentication and decryption failures never are.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Upstream(UpstreamError::RateLimited(_))
                | Error::Upstream(UpstreamError::ServiceUnavailable(_))
        )
    }

    /// Check if this error requires the user to sign in again
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
