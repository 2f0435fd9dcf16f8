// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile view and update routes.

use crate::error::Result;
use crate::middleware::auth::SessionUser;
use crate::models::profile_update::LIST_SEPARATOR;
use crate::models::{PhoneUpdate, PrimaryUpdate, ProfileUpdate, UserProfile};
use crate::services::photo::fetch_photo_as_data_uri;
use crate::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

const PROFILE_PATH: &str = "/profile";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(PROFILE_PATH, get(get_profile))
        .route("/profile/update", post(update_profile))
}

/// Profile page data.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: UserProfile,
    pub full_size_photo: Option<String>,
    /// `;`-joined lists to echo back as the form's original values
    pub original_schools: String,
    pub original_skills: String,
    pub original_interests: String,
}

/// Show the editable profile. Requires the profile write scopes, so the
/// user may first be sent through incremental consent.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Response> {
    let write_scopes = &state.config.profile_write_scopes;
    if let Some(url) = state
        .consent
        .ensure_consent(&session.session_id, write_scopes, PROFILE_PATH)
        .await?
    {
        return Ok(Redirect::to(&url).into_response());
    }

    let client = state
        .directory
        .client_with_scopes(&session.session_id, write_scopes)
        .await?;

    let (photo, profile) = tokio::join!(fetch_photo_as_data_uri(&client, None), client.profile());
    let profile = profile?;
    let full_size_photo = match photo {
        Ok(uri) => Some(uri),
        Err(e) if e.is_directory_status(404) => None,
        Err(e) => return Err(e),
    };

    let separator = LIST_SEPARATOR.to_string();
    let separator = separator.as_str();
    Ok(Json(ProfileResponse {
        original_schools: profile.schools.join(separator),
        original_skills: profile.skills.join(separator),
        original_interests: profile.interests.join(separator),
        profile,
        full_size_photo,
    })
    .into_response())
}

/// What was sent upstream.
#[derive(Serialize)]
pub struct UpdateResponse {
    pub primary: Option<PrimaryUpdate>,
    pub phone: Option<PhoneUpdate>,
}

/// Apply the fields that changed. The primary update and the phone update
/// are separate calls, issued in order; the first failure is returned.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
    Json(form): Json<ProfileUpdate>,
) -> Result<Response> {
    let write_scopes = &state.config.profile_write_scopes;
    if let Some(url) = state
        .consent
        .ensure_consent(&session.session_id, write_scopes, PROFILE_PATH)
        .await?
    {
        return Ok(Redirect::to(&url).into_response());
    }

    let (primary, phone) = form.compute_update();
    if primary.is_none() && phone.is_none() {
        tracing::debug!("Profile form unchanged, nothing to update");
        return Ok(Json(UpdateResponse { primary, phone }).into_response());
    }

    let client = state
        .directory
        .client_with_scopes(&session.session_id, write_scopes)
        .await?;

    if let Some(update) = &primary {
        client.update_profile(update).await?;
    }
    if let Some(update) = &phone {
        client.update_mobile_phone(update).await?;
    }

    tracing::info!(
        primary = primary.is_some(),
        phone = phone.is_some(),
        "Profile updated"
    );
    Ok(Json(UpdateResponse { primary, phone }).into_response())
}
