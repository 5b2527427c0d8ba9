// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Redirect callback decoding
//!
//! The hosted login page returns to the app with a URL whose fragment is
//! either `b64Params=<base64url JSON {sessionId, error}>` or, in the legacy
//! shape, the base64url JSON session payload itself.

use base64::{engine::general_purpose, Engine as _};
use url::Url;

use super::error::SessionError;
use super::types::{RedirectParams, SessionPayload};
use crate::crypto::SessionId;

/// A successfully decoded redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectCallback {
    /// Session id to authorize against the remote store
    Session(SessionId),
    /// Legacy shape: the payload itself travelled in the fragment
    Payload(SessionPayload),
}

/// Decode base64url (or standard base64) with or without `=` padding.
///
/// A leading `?` or `#` is ignored.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, SessionError> {
    let trimmed = input.trim().trim_start_matches(|c| c == '?' || c == '#');
    let mut normalized: String = trimmed
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            // '+' arrives as ' ' after form decoding
            ' ' => '+',
            other => other,
        })
        .collect();

    match normalized.len() % 4 {
        0 => {}
        2 => normalized.push_str("=="),
        3 => normalized.push('='),
        _ => {
            return Err(SessionError::InvalidSession(
                "base64 payload has an impossible length".to_string(),
            ))
        }
    }

    general_purpose::STANDARD
        .decode(normalized.as_bytes())
        .map_err(|e| SessionError::InvalidSession(format!("base64 decode failed: {}", e)))
}

pub fn encode_base64url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn error_param<'a>(pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>) -> Option<String> {
    pairs
        .filter(|(k, _)| k == "error")
        .map(|(_, v)| v.into_owned())
        .find(|v| !v.trim().is_empty())
}

fn decode_json<T: serde::de::DeserializeOwned>(encoded: &str) -> Result<T, SessionError> {
    let bytes = decode_base64url(encoded)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| SessionError::InvalidSession("redirect payload is not UTF-8".to_string()))?;
    serde_json::from_str(&text)
        .map_err(|e| SessionError::InvalidSession(format!("redirect payload is not JSON: {}", e)))
}

/// Parse the redirect URL handed back by the browser collaborator
///
/// # Errors
///
/// - `UserCancelled` when there is no fragment at all
/// - `InvalidSession` when an `error` parameter or JSON field is present,
///   or the fragment cannot be decoded
pub fn parse_redirect(redirect_url: &str) -> Result<RedirectCallback, SessionError> {
    let url = Url::parse(redirect_url)
        .map_err(|e| SessionError::InvalidSession(format!("malformed redirect url: {}", e)))?;

    if let Some(error) = error_param(url.query_pairs()) {
        return Err(SessionError::InvalidSession(error));
    }

    let fragment = match url.fragment().map(str::trim) {
        Some(f) if !f.is_empty() => f,
        _ => {
            return Err(SessionError::UserCancelled(
                "redirect arrived without a result".to_string(),
            ))
        }
    };

    let pairs = || url::form_urlencoded::parse(fragment.as_bytes());
    if let Some(error) = error_param(pairs()) {
        return Err(SessionError::InvalidSession(error));
    }

    if let Some((_, b64_params)) = pairs().find(|(k, _)| k == "b64Params") {
        let params: RedirectParams = decode_json(&b64_params)?;
        if let Some(error) = params.error.filter(|e| !e.trim().is_empty()) {
            return Err(SessionError::InvalidSession(error));
        }
        return match params.session_id.filter(|s| !s.trim().is_empty()) {
            Some(session_id) => Ok(RedirectCallback::Session(SessionId::parse(&session_id)?)),
            None => Err(SessionError::InvalidSession(
                "redirect carried no session id".to_string(),
            )),
        };
    }

    let payload: SessionPayload = decode_json(fragment)?;
    if let Some(error) = payload.error_message() {
        return Err(SessionError::InvalidSession(error.to_string()));
    }
    Ok(RedirectCallback::Payload(payload))
}
