// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session data shapes
//!
//! JSON field names follow the hosted login page, so everything here is
//! `camelCase` on the wire. Optional fields are validated once when a payload
//! is classified into [`Credentials`]; nothing downstream re-checks presence.

use serde::{Deserialize, Serialize};

use super::error::SessionError;

/// Where a login attempt is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    PendingAuthorization,
    Authorized,
    LoggedOut,
    Failed,
}

/// Flow requested from the hosted login page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Login,
    EnableMfa,
    ManageMfa,
}

impl ActionType {
    pub fn requires_session(&self) -> bool {
        !matches!(self, ActionType::Login)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_of_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dapp_share: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o_auth_id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o_auth_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mfa_enabled: Option<bool>,
}

impl UserInfo {
    fn identifies_user(&self) -> bool {
        not_blank(&self.verifier_id) || not_blank(&self.email)
    }
}

/// Decrypted contents of a session record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priv_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ed25519_priv_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_kit_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_kit_ed25519_priv_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn not_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

/// `true` when the key is present but every digit is `0`
pub fn is_zero_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key.trim_start_matches('0').is_empty()
}

impl SessionPayload {
    /// Non-blank error text carried by the payload
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// A present, non-blank private key that is not all zeros
    pub fn has_usable_private_key(&self) -> bool {
        self.priv_key
            .as_deref()
            .map_or(false, |k| !k.trim().is_empty() && !is_zero_key(k))
    }
}

/// What a decrypted payload means for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Active(SessionPayload),
    /// Record decrypted but carries nothing usable, or an all-zero key
    NoSession,
}

impl Credentials {
    /// Classify a payload.
    ///
    /// An explicit error field is an `InvalidSession` failure. A private key
    /// of all zeros is always `NoSession`, even when other fields are set.
    pub fn from_payload(payload: SessionPayload) -> Result<Self, SessionError> {
        if let Some(message) = payload.error_message() {
            return Err(SessionError::InvalidSession(message.to_string()));
        }

        if payload.priv_key.as_deref().map_or(false, is_zero_key) {
            return Ok(Credentials::NoSession);
        }

        let has_user = payload
            .user_info
            .as_ref()
            .map_or(false, UserInfo::identifies_user);

        if payload.has_usable_private_key() || not_blank(&payload.factor_key) || has_user {
            Ok(Credentials::Active(payload))
        } else {
            Ok(Credentials::NoSession)
        }
    }

    pub fn payload(&self) -> Option<&SessionPayload> {
        match self {
            Credentials::Active(payload) => Some(payload),
            Credentials::NoSession => None,
        }
    }
}

/// Options describing the dapp, sent with every login request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptions {
    pub client_id: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_time: Option<u64>,
}

/// Per-login parameters chosen by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_login_options: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dapp_share: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dapp_url: Option<String>,
}

/// Record stored under the login id before the browser is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub options: LoginOptions,
    pub params: LoginParams,
    pub action_type: ActionType,
    /// Current session id, only for MFA flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// JSON carried in the `b64Params` redirect fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectParams {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
