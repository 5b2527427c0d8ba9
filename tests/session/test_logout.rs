// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Logout and remote invalidation

use broadcast_session::session::{SessionError, SessionState, SessionStore};
use broadcast_session::storage::{BroadcastStore, StoreError};

use super::helpers::{harness, publish_session, sample_payload};

#[tokio::test]
async fn test_logout_clears_local_and_remote_state() {
    let h = harness();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol.rehydrate(session_id.clone()).await.unwrap();

    h.protocol.logout().await.unwrap();

    assert_eq!(h.protocol.state().await, SessionState::LoggedOut);
    assert!(h.protocol.current_credentials().await.is_none());
    assert!(h.protocol.private_key().await.is_none());
    assert!(h.protocol.session_id().await.is_none());
    assert!(h.protocol.store().persisted_session_id().await.unwrap().is_none());
    assert!(h
        .remote
        .get(&SessionStore::store_key(&session_id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_invalidated_session_cannot_be_resumed() {
    let h = harness();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol.rehydrate(session_id.clone()).await.unwrap();
    h.protocol.logout().await.unwrap();

    let result = h.protocol.rehydrate(session_id).await;
    assert_eq!(result, Err(SessionError::NoSessionFound));
}

#[tokio::test]
async fn test_remote_failure_still_clears_local_state() {
    let h = harness();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol.rehydrate(session_id).await.unwrap();

    h.remote
        .inject_error(StoreError::ServerError {
            status: 503,
            message: "unavailable".to_string(),
        })
        .await;
    let result = h.protocol.logout().await;

    assert!(matches!(result, Err(SessionError::Network(_))));
    assert_eq!(h.protocol.state().await, SessionState::LoggedOut);
    assert!(h.protocol.current_credentials().await.is_none());
    assert!(h.protocol.store().persisted_session_id().await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_without_session_is_a_no_op() {
    let h = harness();
    h.protocol.logout().await.unwrap();
    h.protocol.logout().await.unwrap();
    assert_eq!(h.protocol.state().await, SessionState::LoggedOut);
    assert_eq!(h.remote.set_count(), 0);
}

#[tokio::test]
async fn test_logout_resolves_from_persisted_id_after_restart() {
    let h = harness();
    let session_id = publish_session(&h.remote, &sample_payload()).await;
    h.protocol
        .store()
        .persist_session_id(&session_id)
        .await
        .unwrap();

    // Nothing activated in this process; the persisted id is used
    h.protocol.logout().await.unwrap();
    assert!(h
        .remote
        .get(&SessionStore::store_key(&session_id))
        .await
        .unwrap()
        .is_none());
}
