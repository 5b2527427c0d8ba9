// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Broadcast Session Protocol
//!
//! - **SessionStore**: active session id, remote record reads/writes,
//!   local persistence and dapp share cache
//! - **SessionProtocol**: login / redirect / resume / logout state machine
//! - **Pending**: single-resolution future handed to the UI layer
//! - **Redirect**: decoding of the browser callback URL

pub mod error;
pub mod pending;
pub mod protocol;
pub mod redirect;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use pending::{pending, Pending, Resolver};
pub use protocol::{BrowserLauncher, SessionProtocol};
pub use redirect::{decode_base64url, encode_base64url, parse_redirect, RedirectCallback};
pub use store::{ActiveSession, AlwaysOnline, NetworkMonitor, SessionStore, SESSION_ID_KEY};
pub use types::{
    is_zero_key, ActionType, Credentials, LoginOptions, LoginParams, LoginRequest,
    RedirectParams, SessionPayload, SessionState, UserInfo,
};
