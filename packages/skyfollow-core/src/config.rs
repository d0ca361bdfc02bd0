//! Core configuration.
//!
//! The only secret the core needs is the token vault key. How strictly its
//! absence is treated depends on the deployment environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Default TTL for cached authenticated agents (5 minutes).
pub const AGENT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of a user session row (7 days).
pub const USER_SESSION_TTL_SECS: i64 = 7 * 24 * 3600;

/// Record collection for follow records.
pub const FOLLOW_COLLECTION: &str = "app.bsky.graph.follow";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local or staging deployments. Configuration gaps degrade with a warning.
    #[default]
    Development,
    /// Configuration gaps are fatal.
    Production,
}

impl Environment {
    /// String form used in env vars and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// Whether this is a production deployment.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" | "test" | "staging" => Ok(Environment::Development),
            other => Err(Error::Configuration(format!("unknown environment '{}'", other))),
        }
    }
}

/// Token vault configuration.
#[derive(Clone, Default)]
pub struct VaultConfig {
    /// 64 hex characters (32 bytes). `None` when unset.
    pub key_hex: Option<String>,
    /// Deployment environment.
    pub environment: Environment,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .finish()
    }
}
