//! # SkyFollow Core
//!
//! Session-authenticated batch search and batch follow against an AT
//! Protocol service.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SKYFOLLOW CORE MODULES                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐    │
//! │  │   Search     │   │   Follow     │   │   Service                │    │
//! │  │              │   │              │   │                          │    │
//! │  │ - Ranking    │   │ - Status     │   │ - search / follow        │    │
//! │  │ - Enrichment │   │ - Batch      │   │ - check_status / logout  │    │
//! │  └──────┬───────┘   └──────┬───────┘   └────────────┬─────────────┘    │
//! │         └──────────────────┴────────────────────────┘                  │
//! │                            │                                            │
//! │  ┌──────────────┐   ┌──────┴───────┐   ┌──────────────────────────┐    │
//! │  │   Crypto     │   │   Agent      │   │   Protocol               │    │
//! │  │              │   │              │   │                          │    │
//! │  │ - TokenVault │◄──│ - Provider   │──►│ - AtprotoAgent           │    │
//! │  │   AES-GCM    │   │ - Cache      │   │ - AgentFactory           │    │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────────────────┘    │
//! │         │                  │                                            │
//! │  ┌──────┴──────────────────┴──────────────────────────────────────┐    │
//! │  │   Storage: SQLite, CredentialStore (OAuth + user sessions)     │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Environment and vault configuration
//! - [`crypto`] - Token-set encryption at rest
//! - [`storage`] - SQLite persistence and credential stores
//! - [`cache`] - Expiring cache abstraction
//! - [`protocol`] - Remote agent seams and wire shapes
//! - [`agent`] - Session → agent resolution
//! - [`follow`] - Follow status and batch follow
//! - [`search`] - Actor search ranking and enrichment
//! - [`service`] - Session-scoped entry points

#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod agent;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod follow;
pub mod protocol;
pub mod search;
pub mod service;
pub mod storage;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use agent::{ResolvedAgent, SessionAgentProvider};
pub use crypto::TokenVault;
pub use error::{Error, Result, UpstreamError};
pub use follow::{BatchFollowOrchestrator, FailSafePolicy, FollowStatusResolver};
pub use search::ActorSearchRanker;
pub use service::SkyFollowService;
pub use storage::{CredentialStore, Database};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
