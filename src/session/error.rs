// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::storage::StoreError;

/// Failures surfaced across the session protocol boundary.
///
/// Every variant has a stable [`SessionError::code`]; the `Display` text is
/// for humans. `Clone` lets one in-flight authorization result be handed to
/// every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Signing failed: {0}")]
    SigningError(String),

    #[error("No user found, please login again!")]
    NoSessionFound,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("User cancelled: {0}")]
    UserCancelled(String),

    #[error("No network connection available")]
    NetworkUnavailable,

    #[error("MFA already enabled")]
    MfaAlreadyEnabled,

    #[error("MFA is not enabled, please enable MFA first")]
    MfaNotEnabled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidPublicKey(_) => "INVALID_PUBLIC_KEY",
            SessionError::DecryptionError(_) => "DECRYPTION_ERROR",
            SessionError::EncryptionError(_) => "ENCRYPTION_ERROR",
            SessionError::SigningError(_) => "SIGNING_ERROR",
            SessionError::NoSessionFound => "NO_SESSION_FOUND",
            SessionError::InvalidSession(_) => "INVALID_SESSION",
            SessionError::UserCancelled(_) => "USER_CANCELLED",
            SessionError::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            SessionError::MfaAlreadyEnabled => "MFA_ALREADY_ENABLED",
            SessionError::MfaNotEnabled => "MFA_NOT_ENABLED",
            SessionError::Network(_) => "NETWORK_ERROR",
            SessionError::Storage(_) => "STORAGE_ERROR",
            SessionError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Failure talking to the broadcast server
    pub(crate) fn remote(err: StoreError) -> Self {
        SessionError::Network(err.to_string())
    }

    /// Failure reading or writing local persisted state
    pub(crate) fn local(err: StoreError) -> Self {
        SessionError::Storage(err.to_string())
    }
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPublicKey { reason } => SessionError::InvalidPublicKey(reason),
            CryptoError::DecryptionFailed { .. } => SessionError::DecryptionError(err.to_string()),
            CryptoError::EncryptionFailed { .. } => SessionError::EncryptionError(err.to_string()),
            CryptoError::SigningFailed { .. } => SessionError::SigningError(err.to_string()),
            CryptoError::InvalidKey { .. } | CryptoError::InvalidPayload { .. } => {
                SessionError::InvalidSession(err.to_string())
            }
        }
    }
}
