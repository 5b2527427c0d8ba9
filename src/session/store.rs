// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Store
//!
//! Owns the active session id and mediates every read and write of the
//! remote session record. Records are addressed by the session's public key
//! and written as signed, encrypted envelopes.
//!
//! **Concurrency**: concurrent [`SessionStore::authorize_session`] calls for
//! the same id share one in-flight fetch. The active session is only changed
//! through `&self` methods guarded by a single `RwLock`.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::types::SessionPayload;
use crate::crypto::{envelope, sign, EncryptedEnvelope, KeyPair, SessionId};
use crate::storage::{BroadcastStore, KeyValueStorage, SetRequest};

/// Local storage key for the last authorized session id
pub const SESSION_ID_KEY: &str = "sessionId";

/// Expiry used for logout tombstones, in seconds
const TOMBSTONE_TIMEOUT_SECS: u64 = 1;

/// Pre-flight connectivity check run before any remote call
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Monitor for environments without a connectivity signal
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl NetworkMonitor for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

type InFlight = Shared<BoxFuture<'static, Result<SessionPayload, SessionError>>>;

/// The session id currently in use and its key pair
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: SessionId,
    pub key_pair: KeyPair,
}

pub struct SessionStore {
    remote: Arc<dyn BroadcastStore>,
    local: Arc<dyn KeyValueStorage>,
    network: Arc<dyn NetworkMonitor>,
    current: RwLock<Option<ActiveSession>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl SessionStore {
    pub fn new(remote: Arc<dyn BroadcastStore>, local: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_network_monitor(remote, local, Arc::new(AlwaysOnline))
    }

    pub fn with_network_monitor(
        remote: Arc<dyn BroadcastStore>,
        local: Arc<dyn KeyValueStorage>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        Self {
            remote,
            local,
            network,
            current: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Remote record key for a session: its uncompressed public key in hex
    pub fn store_key(id: &SessionId) -> String {
        id.key_pair().public_key_hex()
    }

    fn ensure_online(&self) -> Result<(), SessionError> {
        if self.network.is_online() {
            Ok(())
        } else {
            warn!("📵 Remote call skipped: network unavailable");
            Err(SessionError::NetworkUnavailable)
        }
    }

    // ---- active session -------------------------------------------------

    /// Make `id` the active session, replacing any previous one
    pub async fn activate(&self, id: SessionId) -> ActiveSession {
        let session = ActiveSession {
            key_pair: id.key_pair(),
            id,
        };
        *self.current.write().await = Some(session.clone());
        session
    }

    pub async fn current(&self) -> Option<ActiveSession> {
        self.current.read().await.clone()
    }

    pub async fn current_id(&self) -> Option<SessionId> {
        self.current.read().await.as_ref().map(|s| s.id.clone())
    }

    pub async fn clear_current(&self) {
        *self.current.write().await = None;
    }

    // ---- remote record --------------------------------------------------

    /// Encrypt and sign `payload` and upsert it under `id`'s record key
    ///
    /// The envelope is sealed to the session's own public key with a fresh
    /// ephemeral key, so only the holder of the session id can open it. The
    /// signature covers the exact `data` string sent to the server.
    pub async fn create_session(
        &self,
        id: &SessionId,
        payload: &str,
        timeout_secs: u64,
    ) -> Result<SessionId, SessionError> {
        self.ensure_online()?;

        let key_pair = id.key_pair();
        let sealed = envelope::seal(key_pair.public_point(), payload.as_bytes())?;
        let data = sealed.to_json()?;
        let signature = sign(&id.to_bytes(), data.as_bytes())?;

        let request = SetRequest {
            key: key_pair.public_key_hex(),
            data,
            signature: signature.to_der_hex(),
            timeout: timeout_secs,
        };

        self.remote.set(request).await.map_err(SessionError::remote)?;
        info!(
            "📤 Session record written for {} (timeout {}s)",
            id.log_prefix(),
            timeout_secs
        );
        Ok(id.clone())
    }

    /// Fetch, verify and decrypt the record for `id`
    ///
    /// A second call for the same id while one is outstanding joins the first
    /// one's result instead of issuing another fetch.
    pub async fn authorize_session(&self, id: &SessionId) -> Result<SessionPayload, SessionError> {
        self.ensure_online()?;
        let key = Self::store_key(id);

        let fetch = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!("joining in-flight authorization for {}", id.log_prefix());
                    existing.clone()
                }
                None => {
                    let remote = Arc::clone(&self.remote);
                    let id = id.clone();
                    let fetch = async move { fetch_and_open(remote.as_ref(), &id).await }
                        .boxed()
                        .shared();
                    in_flight.insert(key.clone(), fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(&key).map_or(false, |f| f.ptr_eq(&fetch)) {
            in_flight.remove(&key);
        }
        result
    }

    /// Overwrite the remote record with an empty, immediately expiring one
    /// and forget the locally persisted id.
    ///
    /// Local state is cleared first and regardless of the remote outcome.
    /// Invalidating an id that has no record succeeds.
    pub async fn invalidate_session(&self, id: &SessionId) -> Result<(), SessionError> {
        let local_result = self.clear_persisted_session_id_if(id).await;
        {
            let mut current = self.current.write().await;
            if current.as_ref().map_or(false, |s| &s.id == id) {
                *current = None;
            }
        }

        self.ensure_online()?;
        let signature = sign(&id.to_bytes(), b"")?;
        let request = SetRequest {
            key: Self::store_key(id),
            data: String::new(),
            signature: signature.to_der_hex(),
            timeout: TOMBSTONE_TIMEOUT_SECS,
        };
        self.remote.set(request).await.map_err(SessionError::remote)?;
        info!("🗑️  Session {} invalidated", id.log_prefix());
        local_result
    }

    // ---- local persistence ----------------------------------------------

    pub async fn persist_session_id(&self, id: &SessionId) -> Result<(), SessionError> {
        self.local
            .set(SESSION_ID_KEY, id.as_str())
            .await
            .map_err(SessionError::local)
    }

    /// The last persisted session id. An unparsable stored value reads as
    /// absent.
    pub async fn persisted_session_id(&self) -> Result<Option<SessionId>, SessionError> {
        let stored = self
            .local
            .get(SESSION_ID_KEY)
            .await
            .map_err(SessionError::local)?;

        Ok(stored
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match SessionId::parse(&s) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Discarding unreadable persisted session id: {}", e);
                    None
                }
            }))
    }

    pub async fn clear_persisted_session_id(&self) -> Result<(), SessionError> {
        self.local
            .remove(SESSION_ID_KEY)
            .await
            .map_err(SessionError::local)
    }

    async fn clear_persisted_session_id_if(&self, id: &SessionId) -> Result<(), SessionError> {
        match self.persisted_session_id().await {
            Ok(Some(stored)) if &stored != id => Ok(()),
            _ => self.clear_persisted_session_id().await,
        }
    }

    // ---- dapp share -----------------------------------------------------

    fn dapp_share_key(verifier: &str, verifier_id: &str) -> String {
        format!("{} | {}", verifier, verifier_id)
    }

    pub async fn save_dapp_share(
        &self,
        verifier: &str,
        verifier_id: &str,
        share: &str,
    ) -> Result<(), SessionError> {
        self.local
            .set(&Self::dapp_share_key(verifier, verifier_id), share)
            .await
            .map_err(SessionError::local)?;
        debug!("dapp share cached for verifier {}", verifier);
        Ok(())
    }

    /// Cached dapp share for any user of `verifier`
    pub async fn dapp_share(&self, verifier: &str) -> Result<Option<String>, SessionError> {
        let prefix = format!("{} | ", verifier);
        let mut keys = self.local.keys().await.map_err(SessionError::local)?;
        keys.sort();

        for key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
            if let Some(share) = self.local.get(&key).await.map_err(SessionError::local)? {
                if !share.is_empty() {
                    return Ok(Some(share));
                }
            }
        }
        Ok(None)
    }
}

async fn fetch_and_open(
    remote: &dyn BroadcastStore,
    id: &SessionId,
) -> Result<SessionPayload, SessionError> {
    let key = SessionStore::store_key(id);
    let data = remote
        .get(&key)
        .await
        .map_err(SessionError::remote)?
        .ok_or(SessionError::NoSessionFound)?;

    let sealed = EncryptedEnvelope::from_json(&data)?;
    let plaintext = envelope::open(&id.scalar(), &sealed)?;

    let payload: SessionPayload = serde_json::from_slice(&plaintext)
        .map_err(|e| SessionError::InvalidSession(format!("malformed session payload: {}", e)))?;

    if let Some(message) = payload.error_message() {
        return Err(SessionError::InvalidSession(message.to_string()));
    }
    info!("📥 Session record opened for {}", id.log_prefix());
    Ok(payload)
}
