//! SkyFollow CLI
//!
//! Runs batch search, batch follow, follow-status checks and logout for an
//! existing user session, printing JSON to stdout:
//!
//! ```text
//! skyfollow search --session <id> alice @bob.bsky.social
//! skyfollow follow --session <id> did:plc:abc did:plc:def
//! skyfollow status --session <id> did:plc:abc
//! skyfollow logout --session <id>
//! ```
//!
//! Sessions and OAuth credentials are read from the SQLite database written
//! by the sign-in flow.

mod config;
mod xrpc;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use skyfollow_core::{
    BatchFollowOrchestrator, CredentialStore, Database, FollowStatusResolver,
    SessionAgentProvider, SkyFollowService, TokenVault,
};

use config::{Args, Command};
use xrpc::XrpcAgentFactory;

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyfollow=info,skyfollow_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(
        database = args.database.as_str(),
        environment = %args.environment,
        host = args.host.as_str(),
        "Starting"
    );

    let vault = Arc::new(TokenVault::from_config(&args.vault_config())?);
    let db = Database::open(Some(&args.database)).await?;
    let credentials = Arc::new(CredentialStore::new(db.clone(), vault));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.http_timeout_secs))
        .build()?;
    let factory = Arc::new(XrpcAgentFactory::new(http, credentials.clone()));
    let provider = Arc::new(SessionAgentProvider::new(credentials, factory));

    let resolver = FollowStatusResolver::default();
    let service = SkyFollowService::new(
        provider,
        BatchFollowOrchestrator::new(resolver).with_sink(Arc::new(db)),
        resolver,
        args.host.clone(),
    );

    match args.command {
        Command::Search { session, usernames } => {
            let results = service
                .search(&session.session, &usernames, &session.collection)
                .await?;
            print_json(&results)?;
        }
        Command::Follow { session, dids } => {
            let outcome = service
                .follow(&session.session, &dids, &session.collection)
                .await?;
            print_json(&outcome)?;
        }
        Command::Status { session, dids } => {
            let status: BTreeMap<String, bool> = service
                .check_status(&session.session, &dids, &session.collection)
                .await?
                .into_iter()
                .collect();
            print_json(&status)?;
        }
        Command::Logout { session } => {
            service.logout(&session).await?;
            print_json(&json!({ "success": true }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
