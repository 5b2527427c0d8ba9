// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Browser login round-trip: begin, redirect, resume

use std::sync::{Arc, Mutex};

use broadcast_session::session::{
    encode_base64url, ActionType, BrowserLauncher, LoginParams, SessionError, SessionState,
};

use super::helpers::{
    harness, login_id_from_url, publish_session, read_login_request, redirect_for,
    sample_payload, REDIRECT_URL,
};

#[derive(Default)]
struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
}

impl BrowserLauncher for RecordingLauncher {
    fn launch(&self, url: &str) -> Result<(), SessionError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

struct BrokenLauncher;

impl BrowserLauncher for BrokenLauncher {
    fn launch(&self, _url: &str) -> Result<(), SessionError> {
        Err(SessionError::UserCancelled("no browser available".to_string()))
    }
}

fn google_login() -> LoginParams {
    LoginParams {
        login_provider: Some("google".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_login_round_trip() {
    let h = harness();
    let (url, pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();
    assert!(url.contains("/start#b64Params="));
    assert_eq!(h.protocol.state().await, SessionState::PendingAuthorization);

    let session_id = publish_session(&h.remote, &sample_payload()).await;
    let outcome = h.protocol.handle_redirect(&redirect_for(&session_id)).await;
    let payload = outcome.unwrap();

    assert_eq!(pending.await.unwrap(), payload);
    assert_eq!(h.protocol.state().await, SessionState::Authorized);
    assert_eq!(h.protocol.private_key().await, sample_payload().priv_key);
    assert_eq!(
        h.protocol.user_info().await.and_then(|u| u.email),
        Some("alice@example.com".to_string())
    );
    assert_eq!(
        h.protocol.store().persisted_session_id().await.unwrap(),
        Some(session_id)
    );
}

#[tokio::test]
async fn test_login_caches_dapp_share_for_next_login() {
    let h = harness();
    let (_, pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol
        .handle_redirect(&redirect_for(&session_id))
        .await
        .unwrap();
    pending.await.unwrap();

    assert_eq!(
        h.protocol.store().dapp_share("google").await.unwrap(),
        Some("share-words-one two three".to_string())
    );

    let (url, _pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();
    let request = read_login_request(&h.remote, &login_id_from_url(&url)).await;
    assert_eq!(
        request.params.dapp_share.as_deref(),
        Some("share-words-one two three")
    );
}

#[tokio::test]
async fn test_login_request_record_contents() {
    let h = harness();
    let (url, _pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();

    let request = read_login_request(&h.remote, &login_id_from_url(&url)).await;
    assert_eq!(request.action_type, ActionType::Login);
    assert_eq!(request.options.client_id, "test-client-id");
    assert_eq!(request.options.network, "sapphire_devnet");
    assert_eq!(request.params.login_provider.as_deref(), Some("google"));
    assert_eq!(request.params.redirect_url.as_deref(), Some(REDIRECT_URL));
    assert!(request.session_id.is_none());
}

#[tokio::test]
async fn test_initialize_resumes_persisted_session() {
    let h = harness();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol
        .store()
        .persist_session_id(&session_id)
        .await
        .unwrap();

    let credentials = h.protocol.initialize().await.unwrap();
    assert!(credentials.and_then(|c| c.payload().cloned()).is_some());
    assert_eq!(h.protocol.state().await, SessionState::Authorized);
}

#[tokio::test]
async fn test_initialize_without_persisted_session() {
    let h = harness();
    assert!(h.protocol.initialize().await.unwrap().is_none());
    assert_eq!(h.protocol.state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_redirect_without_fragment_is_cancellation() {
    let h = harness();
    let (_, pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();

    let result = h.protocol.handle_redirect(REDIRECT_URL).await;
    assert!(matches!(result, Err(SessionError::UserCancelled(_))));
    assert!(matches!(pending.await, Err(SessionError::UserCancelled(_))));
    assert_eq!(h.protocol.state().await, SessionState::Failed);
}

#[tokio::test]
async fn test_redirect_error_param_fails_login() {
    let h = harness();
    let (_, pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();

    let params = encode_base64url(br#"{"error":"access_denied"}"#);
    let url = format!("{}#b64Params={}", REDIRECT_URL, params);
    let result = h.protocol.handle_redirect(&url).await;

    let expected = SessionError::InvalidSession("access_denied".to_string());
    assert_eq!(result, Err(expected.clone()));
    assert_eq!(pending.await, Err(expected));
}

#[tokio::test]
async fn test_newer_login_supersedes_pending_one() {
    let h = harness();
    let (_, first) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();
    let (_, second) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();

    assert!(matches!(first.await, Err(SessionError::UserCancelled(_))));

    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol
        .handle_redirect(&redirect_for(&session_id))
        .await
        .unwrap();
    assert!(second.await.is_ok());
}

#[tokio::test]
async fn test_cancel_resolves_pending_once() {
    let h = harness();
    let (_, pending) = h
        .protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();

    assert!(h.protocol.cancel("window closed").await);
    assert!(!h.protocol.cancel("window closed again").await);
    assert_eq!(
        pending.await,
        Err(SessionError::UserCancelled("window closed".to_string()))
    );
    assert_eq!(h.protocol.state().await, SessionState::Failed);
}

#[tokio::test]
async fn test_launcher_receives_login_url() {
    let h = harness();
    let launcher = Arc::new(RecordingLauncher::default());
    let protocol = Arc::try_unwrap(h.protocol)
        .ok()
        .unwrap()
        .with_launcher(launcher.clone());

    let (url, _pending) = protocol
        .begin_login(ActionType::Login, google_login())
        .await
        .unwrap();
    assert_eq!(*launcher.opened.lock().unwrap(), vec![url]);
}

#[tokio::test]
async fn test_launcher_failure_fails_login() {
    let h = harness();
    let protocol = Arc::try_unwrap(h.protocol)
        .ok()
        .unwrap()
        .with_launcher(Arc::new(BrokenLauncher));

    let result = protocol
        .begin_login(ActionType::Login, google_login())
        .await;
    assert!(result.is_err());
    assert_eq!(protocol.state().await, SessionState::Failed);
}

#[tokio::test]
async fn test_enable_mfa_requires_session() {
    let h = harness();
    let result = h
        .protocol
        .begin_login(ActionType::EnableMfa, LoginParams::default())
        .await;
    assert!(matches!(result, Err(SessionError::NoSessionFound)));
}

#[tokio::test]
async fn test_enable_mfa_request_carries_session_and_hint() {
    let h = harness();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol.rehydrate(session_id.clone()).await.unwrap();

    let (url, _pending) = h
        .protocol
        .begin_login(ActionType::EnableMfa, LoginParams::default())
        .await
        .unwrap();
    let request = read_login_request(&h.remote, &login_id_from_url(&url)).await;

    assert_eq!(request.action_type, ActionType::EnableMfa);
    assert_eq!(request.session_id.as_deref(), Some(session_id.as_str()));
    assert_eq!(request.params.mfa_level.as_deref(), Some("mandatory"));
    assert_eq!(request.params.login_provider.as_deref(), Some("google"));
    assert_eq!(
        request.params.extra_login_options.unwrap()["login_hint"],
        "alice@example.com"
    );
    assert!(request.params.app_state.is_some());
}

#[tokio::test]
async fn test_mfa_state_preconditions() {
    let h = harness();
    let mut payload = sample_payload();
    if let Some(user) = payload.user_info.as_mut() {
        user.is_mfa_enabled = Some(true);
    }
    let session_id = publish_session(&h.remote, &payload).await;
    h.protocol.rehydrate(session_id).await.unwrap();

    let result = h
        .protocol
        .begin_login(ActionType::EnableMfa, LoginParams::default())
        .await;
    assert!(matches!(result, Err(SessionError::MfaAlreadyEnabled)));
}
