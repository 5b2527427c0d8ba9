// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod broadcast;
pub mod local;

// Re-export main types for convenience
pub use broadcast::{
    BroadcastStore, HttpBroadcastStore, MockBroadcastStore, SetRequest, StoreError,
    StoreGetResponse,
};

pub use local::{EncryptedFileStorage, InMemoryStorage, KeyValueStorage};
