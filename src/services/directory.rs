// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory API client.
//!
//! Every call is described by a [`DirectoryRequest`] and executed through a
//! single `execute` entry point, so tests can point the client at a mock
//! server and inspect exactly what was sent.

use crate::error::{AppError, Result};
use crate::models::{
    CalendarEvent, CollectionPage, DirectoryUserSummary, MailboxSettings, PhoneUpdate,
    PrimaryUpdate, UserProfile,
};
use crate::services::identity::{union_scopes, IdentityService, TokenAcquisition};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Typed parameters of one directory API call.
#[derive(Debug, Clone)]
pub struct DirectoryRequest {
    pub method: Method,
    /// Path relative to the API base, starting with `/`
    pub path: String,
    /// `$select` fields; empty means the server default set
    pub select: Vec<String>,
    /// `$orderby` expression
    pub order_by: Option<String>,
    /// JSON body for PATCH/POST
    pub body: Option<serde_json::Value>,
}

impl DirectoryRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            select: Vec::new(),
            order_by: None,
            body: None,
        }
    }

    pub fn patch<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(|e| AppError::Internal(e.into()))?;
        Ok(Self {
            method: Method::PATCH,
            body: Some(body),
            ..Self::get(path)
        })
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn order_by(mut self, expression: &str) -> Self {
        self.order_by = Some(expression.to_string());
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if !self.select.is_empty() {
            query.push(("$select", self.select.join(",")));
        }
        if let Some(order_by) = &self.order_by {
            query.push(("$orderby", order_by.clone()));
        }
        query
    }
}

/// Directory API HTTP client (unauthenticated; tokens are passed per call).
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Send a request with the given bearer token and check the status.
    pub async fn execute(
        &self,
        access_token: &str,
        request: &DirectoryRequest,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(access_token)
            .query(&request.query());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| AppError::DirectoryApi {
            status: 0,
            message: e.to_string(),
        })?;

        check_response(response).await
    }
}

/// Map a non-success status to a [`AppError::DirectoryApi`] carrying the
/// provider's status code and message.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    tracing::warn!(status, message = %message, "Directory API call failed");
    Err(AppError::DirectoryApi { status, message })
}

/// A directory client bound to an access token. Every request carries
/// `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: DirectoryClient,
    access_token: String,
}

impl AuthenticatedClient {
    pub fn new(client: DirectoryClient, access_token: String) -> Self {
        Self {
            client,
            access_token,
        }
    }

    pub async fn execute(&self, request: &DirectoryRequest) -> Result<reqwest::Response> {
        self.client.execute(&self.access_token, request).await
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: &DirectoryRequest) -> Result<T> {
        self.execute(request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::DirectoryApi {
                status: 0,
                message: format!("JSON parse error: {}", e),
            })
    }

    /// Display name and mail fields of the signed-in user.
    pub async fn me_summary(&self) -> Result<DirectoryUserSummary> {
        let request =
            DirectoryRequest::get("/me").select(&["displayName", "mail", "userPrincipalName"]);
        self.execute_json(&request).await
    }

    /// Full editable profile of the signed-in user.
    pub async fn profile(&self) -> Result<UserProfile> {
        let request = DirectoryRequest::get("/me").select(UserProfile::SELECT);
        self.execute_json(&request).await
    }

    pub async fn update_profile(&self, update: &PrimaryUpdate) -> Result<()> {
        self.execute(&DirectoryRequest::patch("/me", update)?)
            .await?;
        Ok(())
    }

    /// The directory refuses a mobile phone change mixed with other fields,
    /// so it goes through its own PATCH.
    pub async fn update_mobile_phone(&self, update: &PhoneUpdate) -> Result<()> {
        self.execute(&DirectoryRequest::patch("/me", update)?)
            .await?;
        Ok(())
    }

    /// Raw photo bytes, optionally for a named size bucket such as `48x48`.
    pub async fn photo(&self, size: Option<&str>) -> Result<Vec<u8>> {
        let path = match size.filter(|s| !s.is_empty()) {
            Some(size) => format!("/me/photos/{}/$value", urlencoding::encode(size)),
            None => "/me/photo/$value".to_string(),
        };

        let bytes = self
            .execute(&DirectoryRequest::get(path))
            .await?
            .bytes()
            .await
            .map_err(|e| AppError::DirectoryApi {
                status: 0,
                message: format!("Failed to read photo: {}", e),
            })?;
        Ok(bytes.to_vec())
    }

    pub async fn mailbox_settings(&self) -> Result<MailboxSettings> {
        self.execute_json(&DirectoryRequest::get("/me/mailboxSettings"))
            .await
    }

    /// Calendar events, newest first.
    pub async fn events(&self) -> Result<Vec<CalendarEvent>> {
        let request = DirectoryRequest::get("/me/events")
            .select(CalendarEvent::SELECT)
            .order_by(CalendarEvent::ORDER_BY);
        let page: CollectionPage<CalendarEvent> = self.execute_json(&request).await?;
        Ok(page.value)
    }
}

/// Builds [`AuthenticatedClient`]s for a session using silent token
/// acquisition. There is no interactive fallback here: if no token can be
/// obtained silently the caller gets [`AppError::SignInRequired`].
#[derive(Clone)]
pub struct DirectoryService {
    client: DirectoryClient,
    identity: Arc<IdentityService>,
    default_scopes: Vec<String>,
}

impl DirectoryService {
    pub fn new(
        client: DirectoryClient,
        identity: Arc<IdentityService>,
        default_scopes: Vec<String>,
    ) -> Self {
        Self {
            client,
            identity,
            default_scopes,
        }
    }

    /// Client authorized for the default scopes.
    pub async fn client_for(&self, session_id: &str) -> Result<AuthenticatedClient> {
        self.client_with_scopes(session_id, &[]).await
    }

    /// Client authorized for the default scopes plus `extra`.
    pub async fn client_with_scopes(
        &self,
        session_id: &str,
        extra: &[String],
    ) -> Result<AuthenticatedClient> {
        let scopes = union_scopes(&self.default_scopes, extra);
        match self
            .identity
            .acquire_token_silent(session_id, &scopes)
            .await?
        {
            TokenAcquisition::Authorized(token) => {
                Ok(AuthenticatedClient::new(self.client.clone(), token))
            }
            TokenAcquisition::ConsentRequired(_) => {
                tracing::info!("No token available silently, sign-in required");
                Err(AppError::SignInRequired)
            }
        }
    }
}
