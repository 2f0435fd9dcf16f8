// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token cache contents persisted (as an opaque blob) in the session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque serialized token cache. Only the identity service looks inside.
pub type TokenCacheBlob = Vec<u8>;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached tokens for the signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Scopes granted to `access_token`
    pub scopes: Vec<String>,
}

impl TokenCache {
    pub fn to_blob(&self) -> anyhow::Result<TokenCacheBlob> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_blob(blob: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(blob)?)
    }

    /// True if the access token is still good for at least the refresh margin.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }

    /// True if every requested scope was granted. Names compare
    /// case-insensitively and without the resource prefix the provider may
    /// echo back (`https://graph.microsoft.com/User.Read`).
    pub fn covers<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested.iter().all(|wanted| {
            let wanted = wanted.as_ref();
            is_protocol_scope(wanted)
                || self
                    .scopes
                    .iter()
                    .any(|granted| scope_name(granted).eq_ignore_ascii_case(scope_name(wanted)))
        })
    }
}

fn scope_name(scope: &str) -> &str {
    scope.rsplit('/').next().unwrap_or(scope)
}

/// OpenID Connect scopes that never appear in an access token's `scope`.
pub fn is_protocol_scope(scope: &str) -> bool {
    matches!(scope, "openid" | "profile" | "offline_access" | "email")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(scopes: &[&str], expires_in: Duration) -> TokenCache {
        TokenCache {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: Utc::now() + expires_in,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_covers_subset_case_insensitive() {
        let c = cache(&["User.Read", "Calendars.Read"], Duration::hours(1));
        assert!(c.covers(&["user.read"]));
        assert!(c.covers(&["User.Read", "Calendars.Read", "offline_access"]));
        assert!(!c.covers(&["User.Read", "User.ReadWrite"]));
    }

    #[test]
    fn test_covers_ignores_resource_prefix() {
        let c = cache(&["https://graph.microsoft.com/User.ReadWrite"], Duration::hours(1));
        assert!(c.covers(&["User.ReadWrite"]));
    }

    #[test]
    fn test_freshness_respects_margin() {
        let now = Utc::now();
        assert!(cache(&[], Duration::hours(1)).is_fresh(now));
        assert!(!cache(&[], Duration::minutes(4)).is_fresh(now));
        assert!(!cache(&[], Duration::minutes(-1)).is_fresh(now));
    }

    #[test]
    fn test_blob_roundtrip() {
        let c = cache(&["User.Read"], Duration::hours(1));
        let blob = c.to_blob().unwrap();
        assert_eq!(TokenCache::from_blob(&blob).unwrap(), c);
        assert!(TokenCache::from_blob(b"garbage").is_err());
    }
}
