// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, sign-out and consent callback routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::db::keys;
use crate::db::session::PENDING_SESSION_TTL_MINS;
use crate::error::{AppError, Result};
use crate::middleware::auth::{
    clear_session_cookie, create_session_jwt, session_cookie, session_id_from_jar,
};
use crate::services::consent::ConsentCallback;
use crate::services::identity::{union_scopes, AuthorizeRequest};
use crate::services::user::{cache_user, cached_user, forget_user, load_user_details};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// OpenID Connect scopes added to the default scopes at sign-in.
const SIGNIN_PROTOCOL_SCOPES: &[&str] = &["openid", "profile", "offline_access"];

/// How long a sign-in state stays valid; the pending session lasts as long.
const SIGNIN_STATE_MAX_AGE_MS: u128 = PENDING_SESSION_TTL_MINS as u128 * 60 * 1000;

const NONCE_BYTES: usize = 16;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/account/signin", get(sign_in))
        .route("/account/signin-callback", get(sign_in_callback))
        .route("/account/signout", get(sign_out))
        .route("/account/consent", get(consent_callback))
}

fn secure_cookies(state: &AppState) -> bool {
    state.config.redirect_uri.starts_with("https://")
}

fn signin_scopes(state: &AppState) -> Vec<String> {
    let protocol: Vec<String> = SIGNIN_PROTOCOL_SCOPES
        .iter()
        .map(|s| s.to_string())
        .collect();
    union_scopes(&protocol, &state.config.default_scopes)
}

/// Start sign-in: create a session and redirect to the identity provider.
async fn sign_in(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<(CookieJar, Redirect)> {
    if let Some(session_id) = session_id_from_jar(&state, &jar) {
        if cached_user(state.sessions.as_ref(), &session_id).is_some() {
            return Ok((jar, Redirect::to("/")));
        }
        // Half-finished sign-in; start over with a clean session.
        state.identity.sign_out(&session_id);
        state.sessions.destroy(&session_id);
    }

    let session_id = state.sessions.create()?;
    let nonce = random_nonce()?;
    state
        .sessions
        .set(&session_id, keys::SIGNIN_NONCE, nonce.clone().into_bytes())?;

    let oauth_state = sign_state(&nonce, &state.config.session_signing_key)?;
    let scopes = signin_scopes(&state);
    let auth_url = state.identity.client().authorize_url(&AuthorizeRequest {
        redirect_uri: &state.config.redirect_uri,
        scopes: &scopes,
        state: &oauth_state,
        prompt: None,
    });

    let jwt = create_session_jwt(&session_id, &state.config.session_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(
        client_id = %state.config.app_id,
        "Starting sign-in, redirecting to identity provider"
    );

    Ok((
        jar.add(session_cookie(jwt, secure_cookies(&state))),
        Redirect::to(&auth_url),
    ))
}

#[derive(Deserialize)]
pub struct SignInCallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Sign-in callback: verify state, redeem the code, cache the user.
async fn sign_in_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<SignInCallbackParams>,
) -> Result<Redirect> {
    let session_id = session_id_from_jar(&state, &jar).ok_or(AppError::Unauthorized)?;

    if let Some(error) = params.error.as_deref() {
        tracing::warn!(error = %error, "Sign-in error from identity provider");
        return Ok(error_redirect(
            "Error signing in",
            &AppError::callback_debug(Some(error), params.error_description.as_deref()),
        ));
    }

    let (Some(code), Some(oauth_state)) = (params.code.as_deref(), params.state.as_deref()) else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };

    let expected_nonce = state
        .sessions
        .get(&session_id, keys::SIGNIN_NONCE)
        .and_then(|bytes| String::from_utf8(bytes).ok());
    state.sessions.remove(&session_id, keys::SIGNIN_NONCE);

    let nonce = verify_and_decode_state(oauth_state, &state.config.session_signing_key, now_ms()?)
        .ok_or_else(|| AppError::BadRequest("Invalid sign-in state".to_string()))?;
    if expected_nonce.as_deref() != Some(nonce.as_str()) {
        tracing::warn!("Sign-in state does not belong to this session");
        return Err(AppError::BadRequest("Invalid sign-in state".to_string()));
    }

    tracing::info!("Exchanging authorization code for tokens");
    let scopes = signin_scopes(&state);
    state
        .identity
        .redeem_code(&session_id, code, &state.config.redirect_uri, &scopes)
        .await?;

    let client = state.directory.client_for(&session_id).await?;
    let user = load_user_details(&client).await?;
    cache_user(state.sessions.as_ref(), &session_id, &user)?;

    tracing::info!(display_name = %user.display_name, "Sign-in complete");
    Ok(Redirect::to("/"))
}

/// Sign out: drop tokens and cached user, end the session, then end the
/// provider session too.
async fn sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let destination = match session_id_from_jar(&state, &jar) {
        Some(session_id) => {
            state.identity.sign_out(&session_id);
            forget_user(state.sessions.as_ref(), &session_id);
            state.sessions.destroy(&session_id);
            tracing::info!("Signed out");
            state
                .identity
                .client()
                .logout_url(&state.config.post_logout_redirect_uri)
        }
        None => "/".to_string(),
    };

    (
        jar.add(clear_session_cookie(secure_cookies(&state))),
        Redirect::to(&destination),
    )
}

/// Incremental consent callback. A provider error is reported even when
/// the session is gone.
async fn consent_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(callback): Query<ConsentCallback>,
) -> Result<Redirect> {
    callback.code_and_state()?;
    let session_id = session_id_from_jar(&state, &jar).ok_or(AppError::SignInRequired)?;
    let return_path = state
        .consent
        .redeem_consent_code(&session_id, &callback)
        .await?;
    Ok(Redirect::to(local_path_or_root(&return_path)))
}

/// Only follow return paths that stay on this site.
pub fn local_path_or_root(path: &str) -> &str {
    if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") {
        path
    } else {
        "/"
    }
}

fn error_redirect(message: &str, debug: &str) -> Redirect {
    Redirect::to(&format!(
        "/error?message={}&debug={}",
        urlencoding::encode(message),
        urlencoding::encode(debug)
    ))
}

fn now_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn random_nonce() -> Result<String> {
    let mut bytes = [0u8; NONCE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate nonce")))?;
    Ok(hex::encode(bytes))
}

/// Sign "nonce|timestamp_hex" and wrap it for the URL.
fn sign_state(nonce: &str, secret: &[u8]) -> Result<String> {
    let state_payload = format!("{}|{:x}", nonce, now_ms()?);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify HMAC signature and age of a sign-in state; return its nonce.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "nonce|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let nonce = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", nonce, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if !bool::from(signature_hex.as_bytes().ct_eq(expected_signature.as_bytes())) {
        tracing::error!("Sign-in state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > SIGNIN_STATE_MAX_AGE_MS {
        tracing::warn!("Sign-in state expired");
        return None;
    }

    Some(nonce.to_string())
}
