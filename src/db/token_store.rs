// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token cache persistence bound to one session.

use crate::db::keys;
use crate::db::session::SessionStore;
use crate::error::AppError;
use crate::models::TokenCacheBlob;

/// Loads and saves the opaque token cache blob of a single session.
///
/// Must be cleared at sign-out so a reused session never serves the
/// previous user's tokens.
pub struct SessionTokenStore<'a> {
    store: &'a dyn SessionStore,
    session_id: &'a str,
}

impl<'a> SessionTokenStore<'a> {
    pub fn new(store: &'a dyn SessionStore, session_id: &'a str) -> Self {
        Self { store, session_id }
    }

    pub fn load(&self) -> Option<TokenCacheBlob> {
        self.store.get(self.session_id, keys::TOKEN_CACHE)
    }

    pub fn save(&self, blob: TokenCacheBlob) -> Result<(), AppError> {
        self.store.set(self.session_id, keys::TOKEN_CACHE, blob)
    }

    pub fn clear(&self) {
        self.store.remove(self.session_id, keys::TOKEN_CACHE);
    }
}
