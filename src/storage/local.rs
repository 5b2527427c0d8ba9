// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local Key/Value Persistence
//!
//! Holds the last-known session id and cached dapp shares between runs.
//!
//! **File Format** of [`EncryptedFileStorage`]:
//! ```text
//! [salt (16 bytes) | nonce (12 bytes) | AES-256-GCM(json map) + tag]
//! ```
//! The key is PBKDF2-HMAC-SHA256(passphrase, salt, 100 000 iterations),
//! derived on the blocking pool and cached for as long as the salt is unchanged.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::broadcast::StoreError;

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const PBKDF2_ITERATIONS: u32 = 100_000;

#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

/// PBKDF2 output for the salt currently in the file
struct DerivedKey {
    salt: [u8; SALT_SIZE],
    key: [u8; 32],
}

/// Passphrase-sealed JSON map on disk
///
/// Every write re-encrypts the whole map under a fresh nonce. The salt is
/// kept for the life of the file so the PBKDF2 key is derived once per salt
/// rather than once per call.
pub struct EncryptedFileStorage {
    path: PathBuf,
    passphrase: String,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
    key_cache: Mutex<Option<DerivedKey>>,
    derivations: AtomicUsize,
}

impl EncryptedFileStorage {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: passphrase.into(),
            lock: Mutex::new(()),
            key_cache: Mutex::new(None),
            derivations: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key for `salt`, running PBKDF2 off the async executor on a cache miss
    async fn key_for_salt(&self, salt: [u8; SALT_SIZE]) -> Result<[u8; 32], StoreError> {
        let mut cache = self.key_cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.salt == salt) {
            return Ok(cached.key);
        }

        let passphrase = self.passphrase.clone();
        let key = tokio::task::spawn_blocking(move || {
            let mut key = [0u8; 32];
            pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut key);
            key
        })
        .await
        .map_err(|e| StoreError::EncryptionError(format!("key derivation task failed: {}", e)))?;

        self.derivations.fetch_add(1, Ordering::SeqCst);
        *cache = Some(DerivedKey { salt, key });
        Ok(key)
    }

    /// Salt and key for the next write: the file's current ones, or a fresh
    /// salt when nothing has been read or written yet
    async fn write_key(&self) -> Result<([u8; SALT_SIZE], [u8; 32]), StoreError> {
        let cached = self
            .key_cache
            .lock()
            .await
            .as_ref()
            .map(|c| (c.salt, c.key));
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let key = self.key_for_salt(salt).await?;
        Ok((salt, key))
    }

    async fn seal(&self, entries: &HashMap<String, String>) -> Result<Vec<u8>, StoreError> {
        let plaintext = serde_json::to_vec(entries)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let (salt, key) = self.write_key().await?;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| StoreError::EncryptionError(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
            .map_err(|e| StoreError::EncryptionError(format!("encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    async fn unseal(&self, sealed: &[u8]) -> Result<HashMap<String, String>, StoreError> {
        if sealed.len() < SALT_SIZE + NONCE_SIZE {
            return Err(StoreError::EncryptionError(format!(
                "storage file too short: {} bytes",
                sealed.len()
            )));
        }
        let (salt_bytes, rest) = sealed.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(salt_bytes);
        let key = self.key_for_salt(salt).await?;

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| StoreError::EncryptionError(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                StoreError::EncryptionError("wrong passphrase or corrupted file".to_string())
            })?;

        serde_json::from_slice(&plaintext).map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(sealed) => self.unseal(&sealed).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StoreError::IoError(e.to_string())),
        }
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let sealed = self.seal(entries).await?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::IoError(e.to_string()))?;
            }
        }
        tokio::fs::write(&self.path, sealed)
            .await
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        info!("💾 Local session storage written ({} entries)", entries.len());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for EncryptedFileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }
}
