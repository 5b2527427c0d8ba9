// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-resolution promise for an outstanding login
//!
//! The browser redirect can arrive on any thread, or never. The resolver side
//! may be called any number of times but only the first call lands; later
//! calls are rejected and logged instead of overwriting the result.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::warn;

use super::error::SessionError;

/// Create a connected resolver/future pair
pub fn pending<T>() -> (Resolver<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        Resolver {
            sender: Mutex::new(Some(sender)),
        },
        Pending { receiver },
    )
}

pub struct Resolver<T> {
    sender: Mutex<Option<oneshot::Sender<Result<T, SessionError>>>>,
}

impl<T> Resolver<T> {
    /// Resolve the paired future. Returns `false` if it was already resolved.
    pub fn resolve(&self, result: Result<T, SessionError>) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            // A dropped receiver still counts as resolved
            Some(sender) => {
                let _ = sender.send(result);
                true
            }
            None => {
                warn!("⚠️ Ignoring second resolution of a pending login");
                false
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Future side of a pending login
///
/// Resolves to `UserCancelled` if the resolver is dropped unresolved.
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T, SessionError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, SessionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(SessionError::UserCancelled(
                "login was abandoned".to_string(),
            )),
        })
    }
}
