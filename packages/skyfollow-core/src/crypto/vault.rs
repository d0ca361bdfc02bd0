//! # Token Vault
//!
//! AES-256-GCM encryption of OAuth token sets at rest.
//!
//! ## Blob Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SEALED TOKEN BLOB                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  plaintext = serde_json(value)                                         │
//! │                                                                         │
//! │  AES-256-GCM(                                                          │
//! │    key   = vault key (32 bytes, from configuration),                   │
//! │    nonce = random 16 bytes (fresh per call),                           │
//! │  ) → ciphertext || tag (16 bytes)                                      │
//! │                                                                         │
//! │  blob = {"v":1,"nonce":b64,"ciphertext":b64,"tag":b64}                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because the nonce is random, sealing the same value twice yields two
//! different blobs.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, Aead, KeyInit},
    aes::Aes256,
    AesGcm,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::config::VaultConfig;
use crate::error::{Error, Result};

/// AES-256-GCM with a 128-bit nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Size of the vault nonce in bytes (128 bits)
pub const NONCE_SIZE: usize = 16;

/// Size of the GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the vault key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

const BLOB_VERSION: u8 = 1;

/// Vault key, zeroized when dropped.
#[derive(ZeroizeOnDrop)]
struct VaultKey([u8; KEY_SIZE]);

/// Serialized envelope.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SealedBlob {
    v: u8,
    nonce: String,
    ciphertext: String,
    tag: String,
}

/// Symmetric vault for token sets.
///
/// A vault built without a key is *disabled*: it refuses to seal or open
/// anything and callers are expected to store plaintext instead.
pub struct TokenVault {
    key: Option<VaultKey>,
}

impl TokenVault {
    /// Create a vault from raw key bytes
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Some(VaultKey(key)),
        }
    }

    /// Create a vault with no key (plaintext mode)
    pub fn disabled() -> Self {
        Self { key: None }
    }

    /// Parse a 64-character hex key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(key_hex.trim())
            .map_err(|e| Error::Configuration(format!("encryption key is not valid hex: {}", e)))?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::Configuration(format!(
                "encryption key must be {} bytes ({} hex characters), got {} bytes",
                KEY_SIZE,
                KEY_SIZE * 2,
                b.len()
            ))
        })?;
        Ok(Self::new(key))
    }

    /// Build the vault from configuration.
    ///
    /// A missing or malformed key is fatal in production. Elsewhere the vault
    /// is disabled and a warning is logged.
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        let outcome = match config.key_hex.as_deref() {
            Some(key_hex) if !key_hex.trim().is_empty() => Self::from_hex(key_hex),
            _ => Err(Error::Configuration("encryption key is not set".into())),
        };

        match outcome {
            Ok(vault) => Ok(vault),
            Err(e) if config.environment.is_production() => Err(e),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    environment = config.environment.as_str(),
                    "Token vault disabled, OAuth tokens will be stored unencrypted"
                );
                Ok(Self::disabled())
            }
        }
    }

    /// Whether a key is loaded
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    fn cipher(&self) -> Result<Aes256Gcm16> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| Error::Configuration("token vault has no key".into()))?;
        Aes256Gcm16::new_from_slice(&key.0)
            .map_err(|e| Error::Configuration(format!("Invalid key: {}", e)))
    }

    /// Seal a serializable value into a blob string
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let cipher = self.cipher()?;
        let plaintext = serde_json::to_vec(value)?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let mut sealed = cipher
            .encrypt(GenericArray::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        let blob = SealedBlob {
            v: BLOB_VERSION,
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(&sealed),
            tag: STANDARD.encode(tag),
        };
        Ok(serde_json::to_string(&blob)?)
    }

    /// Open a blob produced by [`TokenVault::encrypt`]
    ///
    /// ## Errors
    ///
    /// Returns `DecryptionFailed` if the blob is malformed, was tampered
    /// with, or was sealed under another key.
    pub fn decrypt<T: DeserializeOwned>(&self, blob: &str) -> Result<T> {
        let cipher = self.cipher()?;

        let sealed: SealedBlob = serde_json::from_str(blob)
            .map_err(|e| Error::DecryptionFailed(format!("malformed blob: {}", e)))?;
        if sealed.v != BLOB_VERSION {
            return Err(Error::DecryptionFailed(format!(
                "unsupported blob version {}",
                sealed.v
            )));
        }

        let nonce = decode_field("nonce", &sealed.nonce)?;
        let tag = decode_field("tag", &sealed.tag)?;
        let mut payload = decode_field("ciphertext", &sealed.ciphertext)?;
        if nonce.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return Err(Error::DecryptionFailed("nonce or tag has wrong length".into()));
        }
        payload.extend_from_slice(&tag);

        let plaintext = cipher
            .decrypt(GenericArray::from_slice(&nonce), payload.as_slice())
            .map_err(|_| {
                Error::DecryptionFailed("Decryption failed: authentication tag mismatch".into())
            })?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::DecryptionFailed(format!("plaintext is not the expected shape: {}", e)))
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::DecryptionFailed(format!("{} is not valid base64: {}", name, e)))
}

// ============================================================================
// TESTS
// ============================================================================
