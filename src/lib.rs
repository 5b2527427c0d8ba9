// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod crypto;
pub mod session;
pub mod storage;

// Re-export main types
pub use config::SessionConfig;
pub use crypto::{CryptoError, EncryptedEnvelope, KeyPair, SessionId};
pub use session::{
    ActionType, Credentials, LoginParams, SessionError, SessionPayload, SessionProtocol,
    SessionState, SessionStore, UserInfo,
};
pub use storage::{BroadcastStore, HttpBroadcastStore, KeyValueStorage, MockBroadcastStore};
