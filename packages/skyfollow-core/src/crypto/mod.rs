//! # Crypto Module
//!
//! At-rest protection for OAuth token sets. See [`vault`] for the blob
//! format and failure semantics.

mod vault;

pub use vault::{TokenVault, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
