// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The scope lists are split once here so the rest of the crate never
//! reparses the raw space-delimited settings.

use std::env;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common/oauth2/v2.0";
const DEFAULT_DIRECTORY_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_APP_SCOPES: &str = "User.Read Calendars.Read";
const DEFAULT_PROFILE_WRITE_SCOPES: &str = "User.ReadWrite";
const CONSENT_CALLBACK_PATH: &str = "/account/consent";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application (client) ID registered with the identity provider
    pub app_id: String,
    /// Client secret
    pub app_secret: String,
    /// Callback URI for the primary sign-in flow
    pub redirect_uri: String,
    /// Callback URI for the incremental consent flow.
    /// Must differ from `redirect_uri`.
    pub consent_redirect_uri: String,
    /// Scopes requested at sign-in and for every directory call
    pub default_scopes: Vec<String>,
    /// Extra scopes required before the profile can be edited
    pub profile_write_scopes: Vec<String>,
    /// Identity provider endpoint base (`/authorize`, `/token` appended)
    pub authority: String,
    /// Directory API base URL
    pub directory_base_url: String,
    /// Where the identity provider sends the browser after sign-out
    pub post_logout_redirect_uri: String,
    /// Key for the session JWT and the sign-in state HMAC (raw bytes)
    pub session_signing_key: Vec<u8>,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let redirect_uri =
            env::var("REDIRECT_URI").map_err(|_| ConfigError::Missing("REDIRECT_URI"))?;
        let consent_redirect_uri = match env::var("CONSENT_REDIRECT_URI") {
            Ok(uri) => uri,
            Err(_) => derive_consent_redirect_uri(&redirect_uri)?,
        };
        if consent_redirect_uri == redirect_uri {
            return Err(ConfigError::Invalid(
                "CONSENT_REDIRECT_URI",
                "must differ from REDIRECT_URI".to_string(),
            ));
        }

        let post_logout_redirect_uri = format!("{}/", app_origin(&redirect_uri)?);

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw.clone()))?,
            Err(_) => 8080,
        };

        Ok(Self {
            app_id: env::var("APP_ID").map_err(|_| ConfigError::Missing("APP_ID"))?,
            app_secret: env::var("APP_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("APP_SECRET"))?,
            redirect_uri,
            consent_redirect_uri,
            post_logout_redirect_uri,
            default_scopes: split_scopes(
                &env::var("APP_SCOPES").unwrap_or_else(|_| DEFAULT_APP_SCOPES.to_string()),
            ),
            profile_write_scopes: split_scopes(
                &env::var("PROFILE_WRITE_SCOPES")
                    .unwrap_or_else(|_| DEFAULT_PROFILE_WRITE_SCOPES.to_string()),
            ),
            authority: env::var("AUTHORITY")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_AUTHORITY.to_string()),
            directory_base_url: env::var("DIRECTORY_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_DIRECTORY_BASE_URL.to_string()),
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .into_bytes(),
            port,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            app_id: "test_app_id".to_string(),
            app_secret: "test_secret".to_string(),
            redirect_uri: "http://localhost:8080/account/signin-callback".to_string(),
            consent_redirect_uri: "http://localhost:8080/account/consent".to_string(),
            post_logout_redirect_uri: "http://localhost:8080/".to_string(),
            default_scopes: split_scopes(DEFAULT_APP_SCOPES),
            profile_write_scopes: split_scopes(DEFAULT_PROFILE_WRITE_SCOPES),
            authority: "http://127.0.0.1:9/oauth2/v2.0".to_string(),
            directory_base_url: "http://127.0.0.1:9/v1.0".to_string(),
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
            port: 8080,
        }
    }
}

/// Split a space-delimited scope list, dropping empty entries.
pub fn split_scopes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Scheme, host and port of the sign-in redirect URI.
fn app_origin(redirect_uri: &str) -> Result<&str, ConfigError> {
    let after_scheme = redirect_uri
        .find("://")
        .map(|i| i + 3)
        .ok_or_else(|| ConfigError::Invalid("REDIRECT_URI", redirect_uri.to_string()))?;
    let origin_end = redirect_uri[after_scheme..]
        .find('/')
        .map(|i| after_scheme + i)
        .unwrap_or(redirect_uri.len());
    Ok(&redirect_uri[..origin_end])
}

/// Replace the path of the sign-in redirect URI with the consent callback path.
fn derive_consent_redirect_uri(redirect_uri: &str) -> Result<String, ConfigError> {
    Ok(format!("{}{}", app_origin(redirect_uri)?, CONSENT_CALLBACK_PATH))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
