// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental consent.
//!
//! When a page needs scopes beyond those granted at sign-in, the user is sent
//! back to the identity provider with only the extra scopes and a forced
//! consent prompt. The provider returns to a dedicated callback, the code is
//! redeemed into the session token cache, and the user lands back on the
//! page they started from.

use crate::error::{AppError, Result};
use crate::services::identity::{union_scopes, AuthorizeRequest, IdentityService, TokenAcquisition};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `prompt` value forcing the consent screen even when some of the
/// requested scopes were already granted.
const PROMPT_CONSENT: &str = "consent";

/// What the consent round trip carries through the `state` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentState {
    pub requested_scopes: Vec<String>,
    pub return_path: String,
}

impl ConsentState {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|e| AppError::Internal(e.into()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a state value. The state is opaque: anything we did not
    /// produce is treated as a bare return path.
    pub fn decode(state: &str) -> Self {
        URL_SAFE_NO_PAD
            .decode(state)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_else(|| ConsentState {
                requested_scopes: Vec::new(),
                return_path: state.to_string(),
            })
    }
}

/// Query parameters delivered to the consent callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsentCallback {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ConsentCallback {
    /// `code` and `state`, or the provider's error when either is missing
    /// or empty.
    pub fn code_and_state(&self) -> Result<(&str, &str)> {
        let code = self.code.as_deref().filter(|c| !c.is_empty());
        let state = self.state.as_deref().filter(|s| !s.is_empty());

        match (code, state) {
            (Some(code), Some(state)) => Ok((code, state)),
            _ => Err(AppError::InvalidCallback {
                error: self.error.clone(),
                description: self.error_description.clone(),
            }),
        }
    }
}

/// Decides whether extra consent is needed and completes the round trip.
#[derive(Clone)]
pub struct ConsentNegotiator {
    identity: Arc<IdentityService>,
    default_scopes: Vec<String>,
    /// Callback URI for consent; distinct from the sign-in callback
    consent_redirect_uri: String,
}

impl ConsentNegotiator {
    pub fn new(
        identity: Arc<IdentityService>,
        default_scopes: Vec<String>,
        consent_redirect_uri: String,
    ) -> Self {
        Self {
            identity,
            default_scopes,
            consent_redirect_uri,
        }
    }

    /// Returns `None` if the session already holds a token for the default
    /// scopes plus `extra_scopes`, otherwise the authorization URL to
    /// redirect the user to.
    pub async fn ensure_consent(
        &self,
        session_id: &str,
        extra_scopes: &[String],
        return_path: &str,
    ) -> Result<Option<String>> {
        let scopes = union_scopes(&self.default_scopes, extra_scopes);

        match self
            .identity
            .acquire_token_silent(session_id, &scopes)
            .await?
        {
            TokenAcquisition::Authorized(_) => Ok(None),
            TokenAcquisition::ConsentRequired(_) => {
                let state = ConsentState {
                    requested_scopes: extra_scopes.to_vec(),
                    return_path: return_path.to_string(),
                }
                .encode()?;

                let url = self.identity.client().authorize_url(&AuthorizeRequest {
                    redirect_uri: &self.consent_redirect_uri,
                    scopes: extra_scopes,
                    state: &state,
                    prompt: Some(PROMPT_CONSENT),
                });

                tracing::info!(
                    scopes = %extra_scopes.join(" "),
                    return_path,
                    "Additional consent required"
                );
                Ok(Some(url))
            }
        }
    }

    /// Complete the consent round trip and return the path to send the user
    /// back to.
    pub async fn redeem_consent_code(
        &self,
        session_id: &str,
        callback: &ConsentCallback,
    ) -> Result<String> {
        let (code, state) = callback.code_and_state()?;
        let consent = ConsentState::decode(state);

        // Same redirect URI as the authorization request; the provider
        // requires an exact match.
        self.identity
            .redeem_code(
                session_id,
                code,
                &self.consent_redirect_uri,
                &self.default_scopes,
            )
            .await
            .map_err(|e| match e {
                AppError::IdentityProvider(msg) => AppError::ConsentExchangeFailed(msg),
                other => other,
            })?;

        tracing::info!(
            scopes = %consent.requested_scopes.join(" "),
            "Additional consent granted"
        );
        Ok(consent.return_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let state = ConsentState {
            requested_scopes: vec!["User.ReadWrite".to_string()],
            return_path: "/profile?tab=about me".to_string(),
        };
        let encoded = state.encode().unwrap();

        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        assert_eq!(ConsentState::decode(&encoded), state);
    }

    #[test]
    fn test_foreign_state_is_a_return_path() {
        let decoded = ConsentState::decode("/calendar");
        assert_eq!(decoded.return_path, "/calendar");
        assert!(decoded.requested_scopes.is_empty());
    }

    #[test]
    fn test_code_and_state_required() {
        let callback = ConsentCallback {
            code: Some("abc".to_string()),
            state: Some(String::new()),
            error: Some("access_denied".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            callback.code_and_state(),
            Err(AppError::InvalidCallback { error: Some(e), description: None }) if e == "access_denied"
        ));

        let callback = ConsentCallback {
            code: Some("abc".to_string()),
            state: Some("/profile".to_string()),
            ..Default::default()
        };
        assert_eq!(callback.code_and_state().unwrap(), ("abc", "/profile"));
    }
}
