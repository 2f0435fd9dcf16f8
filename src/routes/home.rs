// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Home and error pages.

use crate::middleware::auth::session_id_from_jar;
use crate::models::CachedUser;
use crate::services::user::cached_user;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/error", get(error_page))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HomeResponse {
    pub signed_in: bool,
    pub user: Option<CachedUser>,
}

/// Home page; shows the cached user when signed in.
async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<HomeResponse> {
    let user = session_id_from_jar(&state, &jar)
        .and_then(|session_id| cached_user(state.sessions.as_ref(), &session_id));

    Json(HomeResponse {
        signed_in: user.is_some(),
        user,
    })
}

#[derive(Deserialize, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ErrorPage {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub debug: Option<String>,
}

/// Error page reached by redirect from failed sign-in or consent.
async fn error_page(Query(page): Query<ErrorPage>) -> Json<ErrorPage> {
    Json(page)
}
