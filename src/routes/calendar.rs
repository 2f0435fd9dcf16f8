// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar route.

use crate::error::Result;
use crate::middleware::auth::SessionUser;
use crate::models::CalendarEvent;
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/calendar", get(get_calendar))
}

/// Signed-in user's events, newest first.
async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Json<Vec<CalendarEvent>>> {
    let client = state.directory.client_for(&session.session_id).await?;
    let events = client.events().await?;
    tracing::debug!(count = events.len(), "Loaded calendar events");
    Ok(Json(events))
}
