// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Remote Session Store
//!
//! The broadcast server is a signed key/value store with expiry:
//!
//! - `GET  {base}/store/get?key=<key>` → `{"message": "<data>"}`
//! - `POST {base}/store/set` with `{key, data, signature, timeout}`
//!
//! `get` may legitimately find nothing; `set` is an idempotent upsert whose
//! record lives for `timeout` seconds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::crypto::{parse_public_key, signature};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("Rejected signature for key {0}")]
    SignatureRejected(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Encryption error: {0}")]
    EncryptionError(String),
}

/// Body of `POST /store/set`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub data: String,
    pub signature: String,
    pub timeout: u64,
}

/// Body of `GET /store/get`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreGetResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait BroadcastStore: Send + Sync {
    /// Fetch the record data for `key`; `Ok(None)` when nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Upsert a signed record that expires after `request.timeout` seconds.
    async fn set(&self, request: SetRequest) -> Result<(), StoreError>;
}

/// HTTP client for a real broadcast server
#[derive(Debug, Clone)]
pub struct HttpBroadcastStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBroadcastStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::NetworkError(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BroadcastStore for HttpBroadcastStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = format!("{}/store/get", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let body: StoreGetResponse = response
            .json()
            .await
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        Ok(body.message.filter(|m| !m.is_empty()))
    }

    async fn set(&self, request: SetRequest) -> Result<(), StoreError> {
        let url = format!("{}/store/set", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(StoreError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[derive(Debug, Clone)]
struct MockRecord {
    data: String,
    signature: String,
    expires_at: i64,
}

/// In-memory broadcast server
///
/// Verifies each write against the public key used as its record key, like
/// the real server does, and counts reads so tests can assert on dedupe.
#[derive(Debug, Clone, Default)]
pub struct MockBroadcastStore {
    records: Arc<Mutex<HashMap<String, MockRecord>>>,
    injected_error: Arc<Mutex<Option<StoreError>>>,
    get_delay: Arc<Mutex<Option<Duration>>>,
    get_count: Arc<AtomicUsize>,
    set_count: Arc<AtomicUsize>,
}

impl MockBroadcastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call (get or set) fails with `error`
    pub async fn inject_error(&self, error: StoreError) {
        *self.injected_error.lock().await = Some(error);
    }

    /// Hold every `get` for `delay` before answering
    pub async fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock().await = Some(delay);
    }

    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }

    pub async fn record_signature(&self, key: &str) -> Option<String> {
        self.records.lock().await.get(key).map(|r| r.signature.clone())
    }

    async fn check_injected_error(&self) -> Result<(), StoreError> {
        if let Some(error) = self.injected_error.lock().await.take() {
            return Err(error);
        }
        Ok(())
    }

    fn verify_write(request: &SetRequest) -> Result<(), StoreError> {
        let key_bytes = hex::decode(&request.key)
            .map_err(|_| StoreError::SignatureRejected(request.key.clone()))?;
        let public = parse_public_key(&key_bytes)
            .map_err(|_| StoreError::SignatureRejected(request.key.clone()))?;
        match signature::verify(&public, request.data.as_bytes(), &request.signature) {
            Ok(true) => Ok(()),
            _ => Err(StoreError::SignatureRejected(request.key.clone())),
        }
    }
}

#[async_trait]
impl BroadcastStore for MockBroadcastStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);

        let delay = *self.get_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_injected_error().await?;

        let now = chrono::Utc::now().timestamp();
        let mut records = self.records.lock().await;
        match records.get(key) {
            Some(record) if record.expires_at <= now => {
                debug!("record expired for key prefix {}", &key[..key.len().min(10)]);
                records.remove(key);
                Ok(None)
            }
            Some(record) if record.data.is_empty() => Ok(None),
            Some(record) => Ok(Some(record.data.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, request: SetRequest) -> Result<(), StoreError> {
        self.set_count.fetch_add(1, Ordering::SeqCst);
        self.check_injected_error().await?;

        if let Err(e) = Self::verify_write(&request) {
            warn!("mock store rejected write: {}", e);
            return Err(e);
        }

        let record = MockRecord {
            data: request.data,
            signature: request.signature,
            expires_at: chrono::Utc::now().timestamp() + request.timeout as i64,
        };
        self.records.lock().await.insert(request.key, record);
        Ok(())
    }
}
