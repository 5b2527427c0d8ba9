// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: a protocol wired to the mock broadcast server, and the
//! hosted login page's side of the exchange.
#![allow(dead_code)]

use std::sync::Arc;

use broadcast_session::crypto::{open, EncryptedEnvelope, SessionId};
use broadcast_session::session::{
    encode_base64url, LoginRequest, SessionPayload, SessionProtocol, SessionStore, UserInfo,
};
use broadcast_session::storage::{BroadcastStore, InMemoryStorage, MockBroadcastStore};
use broadcast_session::SessionConfig;

pub const REDIRECT_URL: &str = "com.example.app://auth";

pub struct TestHarness {
    pub protocol: Arc<SessionProtocol>,
    pub remote: MockBroadcastStore,
    pub local: InMemoryStorage,
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        client_id: "test-client-id".to_string(),
        network: "sapphire_devnet".to_string(),
        redirect_url: Some(REDIRECT_URL.to_string()),
        verifier: Some("google".to_string()),
        ..Default::default()
    }
}

pub fn harness() -> TestHarness {
    harness_with_config(test_config())
}

pub fn harness_with_config(config: SessionConfig) -> TestHarness {
    let remote = MockBroadcastStore::new();
    let local = InMemoryStorage::new();
    let store = SessionStore::new(Arc::new(remote.clone()), Arc::new(local.clone()));
    TestHarness {
        protocol: Arc::new(SessionProtocol::new(config, store)),
        remote,
        local,
    }
}

pub fn sample_payload() -> SessionPayload {
    SessionPayload {
        priv_key: Some("0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9".to_string()),
        ed25519_priv_key: Some("ed".repeat(32)),
        core_kit_key: Some("c0".repeat(32)),
        user_info: Some(UserInfo {
            email: Some("alice@example.com".to_string()),
            verifier: Some("google".to_string()),
            verifier_id: Some("alice@example.com".to_string()),
            type_of_login: Some("google".to_string()),
            dapp_share: Some("share-words-one two three".to_string()),
            is_mfa_enabled: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Write a session record the way the hosted page does after login
pub async fn publish_session(remote: &MockBroadcastStore, payload: &SessionPayload) -> SessionId {
    let server = SessionStore::new(Arc::new(remote.clone()), Arc::new(InMemoryStorage::new()));
    let id = SessionId::generate();
    let json = serde_json::to_string(payload).unwrap();
    server.create_session(&id, &json, 86_400).await.unwrap()
}

/// Redirect URL naming `id` in the `b64Params` fragment
pub fn redirect_for(id: &SessionId) -> String {
    let params = serde_json::json!({ "sessionId": id.as_str() }).to_string();
    format!("{}#b64Params={}", REDIRECT_URL, encode_base64url(params.as_bytes()))
}

/// Extract the login id from a hosted-page URL
pub fn login_id_from_url(url: &str) -> SessionId {
    let encoded = url.split("b64Params=").nth(1).unwrap();
    let decoded = broadcast_session::session::decode_base64url(encoded).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
    SessionId::parse(value["loginId"].as_str().unwrap()).unwrap()
}

/// Read back and decrypt the login request written for `login_id`
pub async fn read_login_request(remote: &MockBroadcastStore, login_id: &SessionId) -> LoginRequest {
    let data = remote
        .get(&SessionStore::store_key(login_id))
        .await
        .unwrap()
        .expect("login request record");
    let envelope = EncryptedEnvelope::from_json(&data).unwrap();
    let plaintext = open(&login_id.scalar(), &envelope).unwrap();
    serde_json::from_slice(&plaintext).unwrap()
}
