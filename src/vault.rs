//! Encryption boundary for bank login credentials.
//!
//! Plaintext credentials only exist between the prompt and [`CredentialVault::encrypt`].
//! Nothing in this crate decrypts a payload; the downloader holds the same key
//! file and does that on its side.

use std::fmt;
use std::io::Write;
use std::path::Path;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CycleError, Result};

pub const KEY_FILE: &str = "vault.key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u8 = 1;

#[derive(Serialize)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials { .. }")
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.username.zeroize();
        self.password.zeroize();
    }
}

/// Opaque sealed credentials: `version || nonce || ciphertext+tag`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPayload(Vec<u8>);

impl EncryptedPayload {
    /// Wrap bytes previously produced by a vault, as read back from storage.
    pub fn from_stored(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedPayload({} bytes)", self.len())
    }
}

pub trait CredentialVault {
    fn encrypt(&self, credentials: &Credentials) -> Result<EncryptedPayload>;
}

/// AES-256-GCM vault keyed from a hex key file in the data directory.
pub struct KeyFileVault {
    key: [u8; KEY_LEN],
}

impl KeyFileVault {
    pub fn from_key(mut key: [u8; KEY_LEN]) -> Self {
        let vault = Self { key };
        key.zeroize();
        vault
    }

    pub fn open(path: &Path) -> Result<Self> {
        let mut raw = std::fs::read_to_string(path).map_err(|e| {
            CycleError::Encryption(format!("cannot read key file {}: {e}", path.display()))
        })?;
        let decoded = hex::decode(raw.trim());
        raw.zeroize();
        let mut bytes = decoded
            .map_err(|_| CycleError::Encryption(format!("key file {} is not hex", path.display())))?;
        if bytes.len() != KEY_LEN {
            bytes.zeroize();
            return Err(CycleError::Encryption(format!(
                "key file {} must hold {KEY_LEN} bytes",
                path.display()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        let vault = Self::from_key(key);
        key.zeroize();
        Ok(vault)
    }

    /// Generate a new key file. Returns false if one already exists.
    pub fn create(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let mut encoded = hex::encode(key);
        key.zeroize();

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let written = options
            .open(path)
            .and_then(|mut file| file.write_all(format!("{encoded}\n").as_bytes()));
        encoded.zeroize();
        written?;
        tracing::info!(path = %path.display(), "created vault key");
        Ok(true)
    }

    /// Short SHA-256 fingerprint of the key, safe to display.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        hex::encode(&digest[..8])
    }
}

impl Drop for KeyFileVault {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl CredentialVault for KeyFileVault {
    fn encrypt(&self, credentials: &Credentials) -> Result<EncryptedPayload> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CycleError::Encryption(e.to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut plaintext =
            serde_json::to_vec(credentials).map_err(|e| CycleError::Encryption(e.to_string()))?;
        let sealed = cipher.encrypt(Nonce::from_slice(&nonce), plaintext.as_slice());
        plaintext.zeroize();
        let sealed = sealed.map_err(|e| CycleError::Encryption(e.to_string()))?;

        let mut envelope = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&sealed);
        Ok(EncryptedPayload(envelope))
    }
}
