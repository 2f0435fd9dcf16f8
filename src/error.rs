// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

/// Placeholder shown when the provider omits an error code.
pub const UNKNOWN_ERROR: &str = "Unknown";
/// Placeholder shown when the provider omits an error description.
pub const NO_DESCRIPTION: &str = "None";

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    /// Silent token acquisition could not produce a token; the user has to
    /// go through interactive sign-in again.
    #[error("Interactive sign-in required")]
    SignInRequired,

    /// The consent callback arrived without `code` or `state`.
    #[error("Error getting consent for additional permissions")]
    InvalidCallback {
        error: Option<String>,
        description: Option<String>,
    },

    #[error("Consent code exchange failed: {0}")]
    ConsentExchangeFailed(String),

    #[error("Directory API error {status}: {message}")]
    DirectoryApi { status: u16, message: String },

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Diagnostic text for an invalid consent callback, with placeholders
    /// for whatever the provider left out.
    pub fn callback_debug(error: Option<&str>, description: Option<&str>) -> String {
        let error = error.filter(|e| !e.is_empty()).unwrap_or(UNKNOWN_ERROR);
        let description = description
            .filter(|d| !d.is_empty())
            .unwrap_or(NO_DESCRIPTION);
        format!("Error: {}\nDescription: {}", error, description)
    }

    /// True if this is a directory error with the given HTTP status.
    pub fn is_directory_status(&self, expected: u16) -> bool {
        matches!(self, AppError::DirectoryApi { status, .. } if *status == expected)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::SignInRequired => {
                return Redirect::to("/account/signin").into_response();
            }
            AppError::InvalidCallback { error, description } => {
                let diagnostics =
                    AppError::callback_debug(error.as_deref(), description.as_deref());
                tracing::warn!(diagnostics = %diagnostics, "Invalid consent callback");
                let location = format!(
                    "/error?message={}&debug={}",
                    urlencoding::encode(&self.to_string()),
                    urlencoding::encode(&diagnostics)
                );
                return Redirect::to(&location).into_response();
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::ConsentExchangeFailed(msg) => {
                tracing::warn!(error = %msg, "Consent code exchange failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "consent_exchange_failed",
                    Some(msg.clone()),
                )
            }
            AppError::DirectoryApi { status, message } => (
                StatusCode::BAD_GATEWAY,
                "directory_error",
                Some(format!("HTTP {}: {}", status, message)),
            ),
            AppError::IdentityProvider(msg) => {
                tracing::error!(error = %msg, "Identity provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "identity_provider_error",
                    Some(msg.clone()),
                )
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
