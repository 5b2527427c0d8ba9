// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Protocol
//!
//! Drives one login attempt at a time through
//! `Unauthenticated → PendingAuthorization → Authorized | LoggedOut | Failed`.
//!
//! ## Flow
//!
//! 1. [`SessionProtocol::begin_login`] writes the login request under a fresh
//!    login id and returns the hosted-page URL plus a pending future
//! 2. The browser collaborator opens the URL and later hands the redirect to
//!    [`SessionProtocol::handle_redirect`]
//! 3. The redirect names a session id whose record is fetched, opened and
//!    classified; the pending future resolves exactly once with the outcome
//! 4. [`SessionProtocol::initialize`] resumes a persisted session on relaunch

use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::error::SessionError;
use super::pending::{pending, Pending, Resolver};
use super::redirect::{encode_base64url, parse_redirect, RedirectCallback};
use super::store::SessionStore;
use super::types::{
    ActionType, Credentials, LoginOptions, LoginParams, LoginRequest, SessionPayload,
    SessionState, UserInfo,
};
use crate::config::SessionConfig;
use crate::crypto::SessionId;
use crate::storage::{EncryptedFileStorage, HttpBroadcastStore, InMemoryStorage, KeyValueStorage};

/// Opens the hosted login page. Implemented by the platform layer.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<(), SessionError>;
}

pub struct SessionProtocol {
    config: SessionConfig,
    store: SessionStore,
    launcher: Option<Arc<dyn BrowserLauncher>>,
    state: RwLock<SessionState>,
    credentials: RwLock<Option<SessionPayload>>,
    pending_login: Mutex<Option<Resolver<SessionPayload>>>,
    // Serializes begin_login so only one login id is live at a time
    login_lock: tokio::sync::Mutex<()>,
}

impl SessionProtocol {
    pub fn new(config: SessionConfig, store: SessionStore) -> Self {
        Self {
            config,
            store,
            launcher: None,
            state: RwLock::new(SessionState::Unauthenticated),
            credentials: RwLock::new(None),
            pending_login: Mutex::new(None),
            login_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Wire an HTTP broadcast store and local storage from `config`
    ///
    /// Local storage is the encrypted file when `storage_path` is set and an
    /// in-memory map otherwise.
    pub fn from_config(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::Config)?;

        let remote = HttpBroadcastStore::new(
            &config.broadcast_url,
            Duration::from_secs(config.request_timeout_secs),
        )
        .map_err(|e| SessionError::Config(e.to_string()))?;

        let local: Arc<dyn KeyValueStorage> =
            match (&config.storage_path, &config.storage_passphrase) {
                (Some(path), Some(passphrase)) => {
                    Arc::new(EncryptedFileStorage::new(path.clone(), passphrase.clone()))
                }
                _ => Arc::new(InMemoryStorage::new()),
            };

        let store = SessionStore::new(Arc::new(remote), local);
        Ok(Self::new(config, store))
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().await;
        if *state != next {
            info!("🔄 Session state {:?} → {:?}", *state, next);
            *state = next;
        }
    }

    // ---- lifecycle ------------------------------------------------------

    /// Resume the locally persisted session, if any
    ///
    /// Returns `Ok(None)` when nothing was persisted.
    pub async fn initialize(&self) -> Result<Option<Credentials>, SessionError> {
        match self.store.persisted_session_id().await? {
            Some(id) => {
                info!("🔁 Resuming persisted session {}", id.log_prefix());
                self.rehydrate(id).await.map(Some)
            }
            None => {
                info!("No persisted session to resume");
                Ok(None)
            }
        }
    }

    /// Re-enter `PendingAuthorization` for an existing session id and
    /// authorize it without a browser round-trip
    pub async fn rehydrate(&self, id: SessionId) -> Result<Credentials, SessionError> {
        self.set_state(SessionState::PendingAuthorization).await;
        self.store.activate(id.clone()).await;

        match self.store.authorize_session(&id).await {
            Ok(payload) => self.settle(&id, payload).await,
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// Start a login (or MFA) flow
    ///
    /// Writes the login request to the remote store under a fresh login id,
    /// opens the browser when a launcher is configured, and returns the URL
    /// with a future that resolves when [`Self::handle_redirect`] or
    /// [`Self::cancel`] is called. A login still pending from an earlier call
    /// is cancelled.
    pub async fn begin_login(
        &self,
        action: ActionType,
        params: LoginParams,
    ) -> Result<(String, Pending<SessionPayload>), SessionError> {
        let _serialized = self.login_lock.lock().await;

        let mut params = params;
        let mut current_session = None;

        if action.requires_session() {
            let user = self.check_mfa_preconditions(action).await?;
            current_session = self.store.current_id().await;
            if current_session.is_none() {
                return Err(SessionError::NoSessionFound);
            }
            apply_mfa_params(&mut params, &user);
        } else if params.dapp_share.is_none() {
            if let Some(verifier) = self.config.verifier.as_deref() {
                params.dapp_share = self.store.dapp_share(verifier).await?;
            }
        }

        let login_id = SessionId::generate();
        if action.requires_session() {
            params.app_state = Some(encode_base64url(
                json!({ "loginId": login_id.as_str() }).to_string().as_bytes(),
            ));
        }
        if params.redirect_url.is_none() {
            params.redirect_url = self.config.redirect_url.clone();
        }

        let request = LoginRequest {
            options: self.login_options(),
            params,
            action_type: action,
            session_id: current_session.map(|id| id.as_str().to_string()),
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| SessionError::InvalidSession(format!("login request: {}", e)))?;

        self.store
            .create_session(&login_id, &request_json, self.config.login_timeout_secs)
            .await?;

        let url = self.login_url(&login_id);
        let (resolver, future) = pending();
        self.replace_pending(resolver);
        self.set_state(SessionState::PendingAuthorization).await;

        if let Some(launcher) = &self.launcher {
            if let Err(e) = launcher.launch(&url) {
                error!("❌ Failed to open login page: {}", e);
                self.resolve_pending(Err(e.clone()));
                self.set_state(SessionState::Failed).await;
                return Err(e);
            }
        }

        info!("🚀 Login started ({:?}) with login id {}", action, login_id.log_prefix());
        Ok((url, future))
    }

    /// Feed the browser redirect back in and resolve the pending login
    ///
    /// Returns the same outcome the pending future receives.
    pub async fn handle_redirect(&self, redirect_url: &str) -> Result<SessionPayload, SessionError> {
        let outcome = match parse_redirect(redirect_url) {
            Ok(RedirectCallback::Session(id)) => {
                if let Err(e) = self.store.persist_session_id(&id).await {
                    warn!("Could not persist session id: {}", e);
                }
                match self.rehydrate(id).await {
                    Ok(Credentials::Active(payload)) => Ok(payload),
                    Ok(Credentials::NoSession) => Err(SessionError::NoSessionFound),
                    Err(e) => Err(e),
                }
            }
            Ok(RedirectCallback::Payload(payload)) => {
                self.set_state(SessionState::PendingAuthorization).await;
                match Credentials::from_payload(payload) {
                    Ok(Credentials::Active(payload)) => {
                        self.authorize(None, payload.clone()).await;
                        Ok(payload)
                    }
                    Ok(Credentials::NoSession) => {
                        self.mark_logged_out().await;
                        Err(SessionError::NoSessionFound)
                    }
                    Err(e) => {
                        self.fail(&e).await;
                        Err(e)
                    }
                }
            }
            Err(e) => {
                warn!("Redirect rejected: {} ({})", e, e.code());
                if self.state().await == SessionState::PendingAuthorization {
                    self.set_state(SessionState::Failed).await;
                }
                Err(e)
            }
        };

        if !self.resolve_pending(outcome.clone()) {
            warn!("Redirect handled with no login pending");
        }
        outcome
    }

    /// Fail the pending login with `UserCancelled(reason)`
    ///
    /// Returns `false` when no login was pending.
    pub async fn cancel(&self, reason: &str) -> bool {
        let resolved = self.resolve_pending(Err(SessionError::UserCancelled(reason.to_string())));
        if resolved {
            info!("🛑 Pending login cancelled: {}", reason);
            if self.state().await == SessionState::PendingAuthorization {
                self.set_state(SessionState::Failed).await;
            }
        }
        resolved
    }

    /// Invalidate the current session remotely and forget it locally
    ///
    /// Local state is cleared even when the remote call fails; the remote
    /// error is still returned. Logging out with no session succeeds.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let id = match self.store.current_id().await {
            Some(id) => Some(id),
            None => self.store.persisted_session_id().await.unwrap_or(None),
        };

        *self.credentials.write().await = None;
        self.set_state(SessionState::LoggedOut).await;

        let result = match id {
            Some(id) => self.store.invalidate_session(&id).await,
            None => {
                self.store.clear_current().await;
                self.store.clear_persisted_session_id().await
            }
        };

        match &result {
            Ok(()) => info!("👋 Logged out"),
            Err(e) => warn!("Logged out locally; remote invalidation failed: {}", e),
        }
        result
    }

    // ---- accessors ------------------------------------------------------

    pub async fn current_credentials(&self) -> Option<SessionPayload> {
        self.credentials.read().await.clone()
    }

    /// The secp256k1 private key, or the Core Kit key when configured
    pub async fn private_key(&self) -> Option<String> {
        let credentials = self.credentials.read().await;
        let payload = credentials.as_ref()?;
        if self.config.use_core_kit_key {
            payload.core_kit_key.clone()
        } else {
            payload.priv_key.clone()
        }
    }

    pub async fn ed25519_private_key(&self) -> Option<String> {
        let credentials = self.credentials.read().await;
        let payload = credentials.as_ref()?;
        if self.config.use_core_kit_key {
            payload.core_kit_ed25519_priv_key.clone()
        } else {
            payload.ed25519_priv_key.clone()
        }
    }

    pub async fn user_info(&self) -> Option<UserInfo> {
        self.credentials
            .read()
            .await
            .as_ref()
            .and_then(|p| p.user_info.clone())
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.store.current_id().await
    }

    // ---- internals ------------------------------------------------------

    fn login_options(&self) -> LoginOptions {
        LoginOptions {
            client_id: self.config.client_id.clone(),
            network: self.config.network.clone(),
            redirect_url: self.config.redirect_url.clone(),
            session_time: Some(self.config.session_timeout_secs),
        }
    }

    fn login_url(&self, login_id: &SessionId) -> String {
        let b64_params = encode_base64url(json!({ "loginId": login_id.as_str() }).to_string().as_bytes());
        format!(
            "{}/start#b64Params={}",
            self.config.sdk_url.trim_end_matches('/'),
            b64_params
        )
    }

    async fn check_mfa_preconditions(&self, action: ActionType) -> Result<UserInfo, SessionError> {
        let credentials = self.credentials.read().await;
        let payload = credentials.as_ref().ok_or(SessionError::NoSessionFound)?;
        let user = payload.user_info.clone().unwrap_or_default();

        match (action, user.is_mfa_enabled) {
            (ActionType::EnableMfa, Some(true)) => Err(SessionError::MfaAlreadyEnabled),
            (ActionType::ManageMfa, Some(false)) => Err(SessionError::MfaNotEnabled),
            _ => Ok(user),
        }
    }

    fn replace_pending(&self, resolver: Resolver<SessionPayload>) {
        let previous = self
            .pending_login
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(resolver);

        if let Some(previous) = previous {
            previous.resolve(Err(SessionError::UserCancelled(
                "superseded by a newer login".to_string(),
            )));
        }
    }

    fn resolve_pending(&self, result: Result<SessionPayload, SessionError>) -> bool {
        let resolver = self
            .pending_login
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match resolver {
            Some(resolver) => resolver.resolve(result),
            None => false,
        }
    }

    async fn settle(&self, id: &SessionId, payload: SessionPayload) -> Result<Credentials, SessionError> {
        match Credentials::from_payload(payload) {
            Ok(Credentials::Active(payload)) => {
                self.authorize(Some(id), payload.clone()).await;
                Ok(Credentials::Active(payload))
            }
            Ok(Credentials::NoSession) => {
                self.mark_logged_out().await;
                Ok(Credentials::NoSession)
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn authorize(&self, fetched_with: Option<&SessionId>, payload: SessionPayload) {
        // The record may hand out a longer-lived session id than the one used to fetch it
        let announced = payload
            .session_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| SessionId::parse(s).ok());

        if let Some(id) = announced.as_ref().or(fetched_with) {
            self.store.activate(id.clone()).await;
            if let Err(e) = self.store.persist_session_id(id).await {
                warn!("Could not persist session id: {}", e);
            }
        }

        if let Some(user) = &payload.user_info {
            if let (Some(share), Some(verifier), Some(verifier_id)) =
                (&user.dapp_share, &user.verifier, &user.verifier_id)
            {
                if !share.is_empty() {
                    if let Err(e) = self.store.save_dapp_share(verifier, verifier_id, share).await {
                        warn!("Could not cache dapp share: {}", e);
                    }
                }
            }
        }

        *self.credentials.write().await = Some(payload);
        self.set_state(SessionState::Authorized).await;
    }

    async fn mark_logged_out(&self) {
        info!("Session record carries no credentials; treating as logged out");
        *self.credentials.write().await = None;
        self.store.clear_current().await;
        if let Err(e) = self.store.clear_persisted_session_id().await {
            warn!("Could not clear persisted session id: {}", e);
        }
        self.set_state(SessionState::LoggedOut).await;
    }

    async fn fail(&self, err: &SessionError) {
        error!("❌ Session authorization failed: {} ({})", err, err.code());
        self.store.clear_current().await;

        // Transport failures keep the persisted id so a later resume can retry
        let transient = matches!(
            err,
            SessionError::Network(_) | SessionError::NetworkUnavailable | SessionError::Storage(_)
        );
        if !transient {
            if let Err(e) = self.store.clear_persisted_session_id().await {
                warn!("Could not clear persisted session id: {}", e);
            }
        }
        self.set_state(SessionState::Failed).await;
    }
}

fn apply_mfa_params(params: &mut LoginParams, user: &UserInfo) {
    params.login_provider = user.type_of_login.clone();
    params.mfa_level = Some("mandatory".to_string());

    let mut extra = match params.extra_login_options.take() {
        Some(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    if let Some(verifier_id) = &user.verifier_id {
        extra.insert("login_hint".to_string(), json!(verifier_id));
    }
    params.extra_login_options = Some(serde_json::Value::Object(extra));
}
