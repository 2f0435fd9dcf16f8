// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie handling and the signed-in middleware.
//!
//! The browser holds an HS256 JWT whose subject is the server-side session
//! ID. Everything else (tokens, cached user) stays on the server.

use crate::db::session::SESSION_TTL_DAYS;
use crate::models::CachedUser;
use crate::services::user::cached_user;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "graph_session";


/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (session ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Signed-in session extracted by [`require_session`].
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub session_id: String,
    pub user: CachedUser,
}

/// Create a JWT naming the session.
pub fn create_session_jwt(session_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: session_id.to_string(),
        iat: now,
        exp: now + (SESSION_TTL_DAYS as usize) * 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Validate a session JWT and return the session ID it names.
pub fn verify_session_jwt(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims.sub)
}

/// Session ID from the cookie jar, if the cookie is valid and the session
/// still exists on the server.
pub fn session_id_from_jar(state: &AppState, jar: &CookieJar) -> Option<String> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let session_id = verify_session_jwt(cookie.value(), &state.config.session_signing_key)?;
    state.sessions.exists(&session_id).then_some(session_id)
}

/// Session cookie. Marked `Secure` when the app is served over HTTPS.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// Removal cookie for the session, with the same attributes as creation.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

/// Middleware that requires a signed-in session; otherwise the browser is
/// sent to sign in.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let signed_in = session_id_from_jar(&state, &jar).and_then(|session_id| {
        cached_user(state.sessions.as_ref(), &session_id).map(|user| SessionUser { session_id, user })
    });

    match signed_in {
        Some(session_user) => {
            request.extensions_mut().insert(session_user);
            next.run(request).await
        }
        None => Redirect::to("/account/signin").into_response(),
    }
}
