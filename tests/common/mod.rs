// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use directory_profile::config::Config;
use directory_profile::db::SessionTokenStore;
use directory_profile::middleware::auth::{create_session_jwt, SESSION_COOKIE};
use directory_profile::models::{CachedUser, TokenCache};
use directory_profile::routes::create_router;
use directory_profile::services::user::cache_user;
use directory_profile::AppState;
use std::sync::Arc;

/// Create a test app whose identity provider and directory are unreachable.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    app_with_config(Config::test_default())
}

/// Create a test app pointing both the identity provider and the directory
/// at a mock server.
#[allow(dead_code)]
pub fn create_test_app_with_upstream(upstream: &str) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.authority = format!("{}/common/oauth2/v2.0", upstream);
    config.directory_base_url = format!("{}/v1.0", upstream);
    app_with_config(config)
}

fn app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn test_user() -> CachedUser {
    CachedUser {
        display_name: "Adele Vance".to_string(),
        email: "adele@contoso.com".to_string(),
        avatar: None,
        time_zone: Some("Pacific Standard Time".to_string()),
        date_format: None,
        time_format: None,
    }
}

/// Token cache for `scopes` that stays fresh for an hour.
#[allow(dead_code)]
pub fn fresh_tokens(access_token: &str, scopes: &[&str]) -> TokenCache {
    TokenCache {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
    }
}

/// Create a signed-in session holding `tokens`; returns the session ID and
/// the `Cookie` header value for it.
#[allow(dead_code)]
pub fn signed_in_session(state: &AppState, tokens: &TokenCache) -> (String, String) {
    let session_id = state.sessions.create().unwrap();
    cache_user(state.sessions.as_ref(), &session_id, &test_user()).unwrap();
    SessionTokenStore::new(state.sessions.as_ref(), &session_id)
        .save(tokens.to_blob().unwrap())
        .unwrap();

    let jwt = create_session_jwt(&session_id, &state.config.session_signing_key).unwrap();
    (session_id, format!("{}={}", SESSION_COOKIE, jwt))
}
