//! Command-line and environment configuration.

use clap::{Args as ClapArgs, Parser, Subcommand};
use skyfollow_core::config::{Environment, VaultConfig, FOLLOW_COLLECTION};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "skyfollow", version, about = "Batch search and follow on Bluesky")]
pub struct Args {
    /// SQLite database path
    #[arg(long, default_value = "skyfollow.db", env = "SKYFOLLOW_DATABASE")]
    pub database: String,

    /// 64 hex character key for sealing OAuth tokens at rest
    #[arg(long, env = "TOKEN_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Deployment environment (development or production)
    #[arg(long, default_value = "development", env = "SKYFOLLOW_ENV")]
    pub environment: Environment,

    /// Host the sessions were issued for
    #[arg(long, default_value = "localhost", env = "SKYFOLLOW_HOST")]
    pub host: String,

    /// Timeout for each upstream HTTP request
    #[arg(long, default_value_t = 30, env = "SKYFOLLOW_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            key_hex: self.encryption_key.clone(),
            environment: self.environment,
        }
    }
}

/// Options shared by every session-scoped command.
#[derive(ClapArgs, Debug, Clone)]
pub struct SessionArgs {
    /// User session id
    #[arg(long, env = "SKYFOLLOW_SESSION")]
    pub session: String,

    /// Record collection that holds follows
    #[arg(long, default_value = FOLLOW_COLLECTION)]
    pub collection: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search for accounts matching imported usernames
    Search {
        #[command(flatten)]
        session: SessionArgs,
        /// Usernames to look up (1 to 50)
        #[arg(required = true)]
        usernames: Vec<String>,
    },
    /// Follow accounts by DID
    Follow {
        #[command(flatten)]
        session: SessionArgs,
        /// DIDs to follow (1 to 100)
        #[arg(required = true)]
        dids: Vec<String>,
    },
    /// Show which DIDs are already followed
    Status {
        #[command(flatten)]
        session: SessionArgs,
        /// DIDs to check (1 to 100)
        #[arg(required = true)]
        dids: Vec<String>,
    },
    /// Revoke and delete the session
    Logout {
        /// User session id
        #[arg(long, env = "SKYFOLLOW_SESSION")]
        session: String,
    },
}
