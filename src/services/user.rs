// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached user details: built once at sign-in, read on every page.

use crate::db::session::{get_json, set_json};
use crate::db::{keys, SessionStore};
use crate::error::Result;
use crate::models::CachedUser;
use crate::services::directory::AuthenticatedClient;
use crate::services::photo::fetch_photo_as_data_uri;

/// Size bucket used for the avatar shown in the navigation bar.
pub const AVATAR_SIZE: &str = "48x48";

/// Build a [`CachedUser`] from the directory.
///
/// Profile, avatar and mailbox settings are independent reads and are
/// issued concurrently. A user without a photo gets `avatar: None`.
pub async fn load_user_details(client: &AuthenticatedClient) -> Result<CachedUser> {
    let (summary, avatar, mailbox) = tokio::join!(
        client.me_summary(),
        fetch_photo_as_data_uri(client, Some(AVATAR_SIZE)),
        client.mailbox_settings(),
    );

    let summary = summary?;
    let mailbox = mailbox?;
    let avatar = match avatar {
        Ok(uri) => Some(uri),
        Err(e) if e.is_directory_status(404) => None,
        Err(e) => return Err(e),
    };

    Ok(CachedUser {
        display_name: summary.display_name.clone().unwrap_or_default(),
        email: summary.email(),
        avatar,
        time_zone: mailbox.time_zone,
        date_format: mailbox.date_format,
        time_format: mailbox.time_format,
    })
}

pub fn cached_user(store: &dyn SessionStore, session_id: &str) -> Option<CachedUser> {
    get_json(store, session_id, keys::USER)
}

pub fn cache_user(store: &dyn SessionStore, session_id: &str, user: &CachedUser) -> Result<()> {
    set_json(store, session_id, keys::USER, user)
}

pub fn forget_user(store: &dyn SessionStore, session_id: &str) {
    store.remove(session_id, keys::USER);
}
