// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile photo as an inline `data:` URI.

use crate::error::Result;
use crate::services::directory::AuthenticatedClient;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Fetch the signed-in user's photo (optionally a size bucket such as
/// `48x48`) and encode it for direct use in an `<img src>`.
///
/// Photos are a few kilobytes, so the whole image is buffered.
pub async fn fetch_photo_as_data_uri(
    client: &AuthenticatedClient,
    size: Option<&str>,
) -> Result<String> {
    let bytes = client.photo(size).await?;
    Ok(to_data_uri(&bytes))
}

pub fn to_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}
