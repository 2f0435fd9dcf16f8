// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side session storage.
//!
//! Each session is a small key/value map addressed by an opaque session ID.
//! Handlers never touch ambient state: the store is injected through
//! `AppState` and every access names the session explicitly.

use crate::db::keys;
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Length of a session ID in random bytes (hex encoded on the wire).
const SESSION_ID_BYTES: usize = 32;

/// Lifetime of a signed-in session, matching the session cookie.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Lifetime of a session that has not finished sign-in.
pub const PENDING_SESSION_TTL_MINS: i64 = 10;

/// Opaque session identifier.
pub type SessionId = String;

/// Shared session store handle.
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// Per-session key/value persistence.
pub trait SessionStore: Send + Sync + 'static {
    /// Create an empty session and return its ID.
    fn create(&self) -> Result<SessionId, AppError>;

    /// True if the session exists.
    fn exists(&self, session_id: &str) -> bool;

    /// Read a value. `None` if the key or the session is absent.
    fn get(&self, session_id: &str, key: &str) -> Option<Vec<u8>>;

    /// Write a value. Fails if the session does not exist.
    fn set(&self, session_id: &str, key: &str, value: Vec<u8>) -> Result<(), AppError>;

    /// Remove a single key.
    fn remove(&self, session_id: &str, key: &str);

    /// Drop the session and everything in it.
    fn destroy(&self, session_id: &str);

    /// Drop every session expired at `now`; returns the IDs dropped.
    fn expire(&self, now: DateTime<Utc>) -> Vec<SessionId>;
}

struct SessionEntry {
    created_at: DateTime<Utc>,
    values: HashMap<String, Vec<u8>>,
}

impl SessionEntry {
    fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            values: HashMap::new(),
        }
    }

    /// A session is signed in once it holds the cached user.
    fn expires_at(&self) -> DateTime<Utc> {
        if self.values.contains_key(keys::USER) {
            self.created_at + Duration::days(SESSION_TTL_DAYS)
        } else {
            self.created_at + Duration::minutes(PENDING_SESSION_TTL_MINS)
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// In-process session store. Expired sessions read as absent and are
/// dropped by [`SessionStore::expire`].
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
    rng: SystemRandom,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            rng: SystemRandom::new(),
        }
    }

    /// Number of stored sessions, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self) -> Result<SessionId, AppError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate session ID")))?;
        let session_id = hex::encode(bytes);
        self.sessions
            .insert(session_id.clone(), SessionEntry::new(Utc::now()));
        Ok(session_id)
    }

    fn exists(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|session| session.is_live(Utc::now()))
    }

    fn get(&self, session_id: &str, key: &str) -> Option<Vec<u8>> {
        self.sessions
            .get(session_id)
            .filter(|session| session.is_live(Utc::now()))
            .and_then(|session| session.values.get(key).cloned())
    }

    fn set(&self, session_id: &str, key: &str, value: Vec<u8>) -> Result<(), AppError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or(AppError::Unauthorized)?;
        session.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, session_id: &str, key: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.values.remove(key);
        }
    }

    fn destroy(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    fn expire(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        let mut expired = Vec::new();
        self.sessions.retain(|session_id, session| {
            let live = session.is_live(now);
            if !live {
                expired.push(session_id.clone());
            }
            live
        });
        expired
    }
}

/// Read a JSON value from the session. Corrupt entries read as absent.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn SessionStore,
    session_id: &str,
    key: &str,
) -> Option<T> {
    let bytes = store.get(session_id, key)?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unreadable session entry");
            None
        }
    }
}

/// Write a JSON value into the session.
pub fn set_json<T: Serialize>(
    store: &dyn SessionStore,
    session_id: &str,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let bytes = serde_json::to_vec(value).map_err(|e| AppError::Internal(e.into()))?;
    store.set(session_id, key, bytes)
}
