// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client and per-session token management.
//!
//! Handles:
//! - Authorization request URLs (sign-in and incremental consent)
//! - Authorization code exchange
//! - Silent token acquisition from the session token cache, refreshing
//!   when the cached token is expiring or lacks a requested scope

use crate::db::{SessionTokenStore, SharedSessionStore};
use crate::error::{AppError, Result};
use crate::models::token::is_protocol_scope;
use crate::models::TokenCache;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Scope that makes the provider issue a refresh token.
pub const OFFLINE_ACCESS: &str = "offline_access";

/// Provider error codes meaning the user has to interact (sign in or consent).
const INTERACTION_ERRORS: &[&str] = &[
    "invalid_grant",
    "interaction_required",
    "consent_required",
    "login_required",
];

/// Identity provider OAuth2/OpenID Connect endpoints.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    authority: String,
    client_id: String,
    client_secret: String,
}

/// Parameters of an authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest<'a> {
    pub redirect_uri: &'a str,
    pub scopes: &'a [String],
    pub state: &'a str,
    /// `prompt` override, e.g. `consent` to force the consent screen
    pub prompt: Option<&'a str>,
}

impl IdentityClient {
    pub fn new(authority: String, client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority,
            client_id,
            client_secret,
        }
    }

    /// Build the URL the browser is sent to for an authorization request.
    pub fn authorize_url(&self, request: &AuthorizeRequest<'_>) -> String {
        let mut url = format!(
            "{}/authorize?\
             client_id={}&\
             response_type=code&\
             response_mode=query&\
             redirect_uri={}&\
             scope={}&\
             state={}",
            self.authority,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(request.redirect_uri),
            urlencoding::encode(&request.scopes.join(" ")),
            urlencoding::encode(request.state),
        );

        if let Some(prompt) = request.prompt {
            url.push_str("&prompt=");
            url.push_str(&urlencoding::encode(prompt));
        }

        url
    }

    /// Provider sign-out URL; ends the provider's own session cookie and
    /// returns the browser to `post_logout_redirect_uri`.
    pub fn logout_url(&self, post_logout_redirect_uri: &str) -> String {
        format!(
            "{}/logout?post_logout_redirect_uri={}",
            self.authority,
            urlencoding::encode(post_logout_redirect_uri)
        )
    }

    /// Exchange an authorization code. `redirect_uri` must be the exact URI
    /// the code was requested with.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> std::result::Result<TokenResponse, TokenError> {
        let scope = scopes.join(" ");
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Redeem a refresh token for an access token covering `scopes`.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> std::result::Result<TokenResponse, TokenError> {
        let scope = scopes.join(" ");
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
    ) -> std::result::Result<TokenResponse, TokenError> {
        let response = self
            .http
            .post(format!("{}/token", self.authority))
            .form(form)
            .send()
            .await
            .map_err(|e| TokenError::Transport(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ProviderError>(&body) {
                Ok(err) => TokenError::Provider {
                    error: err.error,
                    description: err.error_description.unwrap_or_default(),
                },
                Err(_) => TokenError::Transport(format!("HTTP {}: {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| TokenError::Transport(format!("Failed to parse token response: {}", e)))
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    /// Space-delimited scopes actually granted
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Turn the response into a cache entry. Granted scopes come from the
    /// response when present, otherwise the requested ones are assumed.
    pub fn into_cache(self, requested: &[String], previous_refresh: Option<String>) -> TokenCache {
        let granted: Vec<String> = self
            .scope
            .as_deref()
            .map(crate::config::split_scopes)
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !is_protocol_scope(s))
            .collect();

        let scopes = if granted.is_empty() {
            requested
                .iter()
                .filter(|s| !is_protocol_scope(s))
                .cloned()
                .collect()
        } else {
            granted
        };

        TokenCache {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            scopes,
        }
    }
}

#[derive(Deserialize)]
struct ProviderError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token endpoint failure.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{error}: {description}")]
    Provider { error: String, description: String },

    #[error("{0}")]
    Transport(String),
}

impl TokenError {
    /// True if the provider wants the user to sign in or consent again.
    pub fn requires_interaction(&self) -> bool {
        matches!(self, TokenError::Provider { error, .. } if INTERACTION_ERRORS.contains(&error.as_str()))
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::IdentityProvider(err.to_string())
    }
}

/// Outcome of silent token acquisition.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenAcquisition {
    /// A usable access token covering the requested scopes.
    Authorized(String),
    /// The user has to interact (consent or sign in) to obtain these scopes.
    ConsentRequired(Vec<String>),
}

/// Per-session mutex type used to serialize refreshes.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Token lifecycle for signed-in sessions.
///
/// The token cache lives in the session; this service is the only code that
/// looks inside the blob.
#[derive(Clone)]
pub struct IdentityService {
    client: IdentityClient,
    sessions: SharedSessionStore,
    /// Per-session mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl IdentityService {
    pub fn new(client: IdentityClient, sessions: SharedSessionStore) -> Self {
        Self {
            client,
            sessions,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &IdentityClient {
        &self.client
    }

    fn load_cache(&self, session_id: &str) -> Option<TokenCache> {
        let blob = SessionTokenStore::new(self.sessions.as_ref(), session_id).load()?;
        match TokenCache::from_blob(&blob) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable token cache");
                None
            }
        }
    }

    fn store_cache(&self, session_id: &str, cache: &TokenCache) -> Result<()> {
        SessionTokenStore::new(self.sessions.as_ref(), session_id).save(cache.to_blob()?)
    }

    /// Get an access token for `scopes` without user interaction.
    ///
    /// 1. Use the cached token if it covers the scopes and is not expiring
    /// 2. Otherwise take the session's refresh lock and re-check
    /// 3. Refresh with the requested scopes and store the result
    /// 4. Interaction errors from the provider become `ConsentRequired`
    pub async fn acquire_token_silent(
        &self,
        session_id: &str,
        scopes: &[String],
    ) -> Result<TokenAcquisition> {
        let Some(cache) = self.load_cache(session_id) else {
            tracing::debug!("No cached token, interaction required");
            return Ok(TokenAcquisition::ConsentRequired(scopes.to_vec()));
        };

        if cache.covers(scopes) && cache.is_fresh(Utc::now()) {
            return Ok(TokenAcquisition::Authorized(cache.access_token));
        }

        let lock = self
            .refresh_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another request may have refreshed while we were waiting.
        let Some(cache) = self.load_cache(session_id) else {
            return Ok(TokenAcquisition::ConsentRequired(scopes.to_vec()));
        };
        if cache.covers(scopes) && cache.is_fresh(Utc::now()) {
            return Ok(TokenAcquisition::Authorized(cache.access_token));
        }

        let Some(refresh_token) = cache.refresh_token else {
            tracing::info!("Cached token cannot be refreshed, interaction required");
            return Ok(TokenAcquisition::ConsentRequired(scopes.to_vec()));
        };

        match self
            .client
            .refresh(&refresh_token, &with_offline_access(scopes))
            .await
        {
            Ok(response) => {
                let refreshed = response.into_cache(scopes, Some(refresh_token));
                self.store_cache(session_id, &refreshed)?;
                tracing::info!(scopes = %scopes.join(" "), "Token refreshed");
                Ok(TokenAcquisition::Authorized(refreshed.access_token))
            }
            Err(e) if e.requires_interaction() => {
                tracing::info!(error = %e, "Silent acquisition needs user interaction");
                Ok(TokenAcquisition::ConsentRequired(scopes.to_vec()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Exchange an authorization code and merge the result into the
    /// session's token cache.
    pub async fn redeem_code(
        &self,
        session_id: &str,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<()> {
        let response = self
            .client
            .exchange_code(code, redirect_uri, &with_offline_access(scopes))
            .await?;

        let previous_refresh = self.load_cache(session_id).and_then(|c| c.refresh_token);
        let cache = response.into_cache(scopes, previous_refresh);
        self.store_cache(session_id, &cache)?;

        tracing::info!(scopes = %cache.scopes.join(" "), "Authorization code redeemed");
        Ok(())
    }

    /// Forget every token held for the session.
    pub fn sign_out(&self, session_id: &str) {
        SessionTokenStore::new(self.sessions.as_ref(), session_id).clear();
        self.release_refresh_lock(session_id);
    }

    /// Drop the refresh lock of a session that no longer exists.
    pub fn release_refresh_lock(&self, session_id: &str) {
        self.refresh_locks.remove(session_id);
    }
}

/// Union of two scope lists, keeping the first spelling of each scope.
pub fn union_scopes(base: &[String], extra: &[String]) -> Vec<String> {
    let mut scopes = base.to_vec();
    for scope in extra {
        if !scopes.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            scopes.push(scope.clone());
        }
    }
    scopes
}

fn with_offline_access(scopes: &[String]) -> Vec<String> {
    union_scopes(scopes, &[OFFLINE_ACCESS.to_string()])
}
