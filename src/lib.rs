// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Directory profile: sign in with OpenID Connect and work with the signed-in
//! user's directory profile, photo and calendar.
//!
//! This crate provides the web backend: session-bound token caching,
//! incremental consent for extra permission scopes, and minimal partial
//! profile updates.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use chrono::{DateTime, Utc};
use config::Config;
use db::{MemorySessionStore, SharedSessionStore};
use services::{ConsentNegotiator, DirectoryClient, DirectoryService, IdentityClient, IdentityService};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: SharedSessionStore,
    pub identity: Arc<IdentityService>,
    pub directory: DirectoryService,
    pub consent: ConsentNegotiator,
}

impl AppState {
    /// Wire up services from configuration with an in-process session store.
    pub fn new(config: Config) -> Self {
        Self::with_sessions(config, Arc::new(MemorySessionStore::new()))
    }

    pub fn with_sessions(config: Config, sessions: SharedSessionStore) -> Self {
        let identity_client = IdentityClient::new(
            config.authority.clone(),
            config.app_id.clone(),
            config.app_secret.clone(),
        );
        let identity = Arc::new(IdentityService::new(identity_client, sessions.clone()));

        let directory = DirectoryService::new(
            DirectoryClient::new(config.directory_base_url.clone()),
            identity.clone(),
            config.default_scopes.clone(),
        );

        let consent = ConsentNegotiator::new(
            identity.clone(),
            config.default_scopes.clone(),
            config.consent_redirect_uri.clone(),
        );

        Self {
            config,
            sessions,
            identity,
            directory,
            consent,
        }
    }
}

impl AppState {
    /// Drop expired sessions and their refresh locks. Returns how many
    /// sessions were dropped.
    pub fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> usize {
        let expired = self.sessions.expire(now);
        for session_id in &expired {
            self.identity.release_refresh_lock(session_id);
        }
        expired.len()
    }
}

/// Sweep expired sessions every `period` for the life of the process.
pub fn spawn_session_sweeper(state: Arc<AppState>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = state.sweep_expired_sessions(Utc::now());
            if evicted > 0 {
                tracing::info!(evicted, "Evicted expired sessions");
            }
        }
    })
}
