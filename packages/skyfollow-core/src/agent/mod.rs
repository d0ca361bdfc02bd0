//! # Agent Module
//!
//! Turns an opaque user session id into a live, authenticated agent.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AGENT RESOLUTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  session_id ──► UserSessionStore ──► did        (missing → 401)        │
//! │                                                                         │
//! │  (host, session_id) ──► AgentCache (5 min TTL)                         │
//! │        hit  → reuse                                                     │
//! │        miss → AgentFactory::create_agent → cache                        │
//! │                                                                         │
//! │  agent.restore_session(did)                                             │
//! │        ok   → ResolvedAgent { agent, did }                              │
//! │        err  → evict cache entry, 401                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod provider;

pub use provider::{AgentCache, ResolvedAgent, SessionAgentProvider};
