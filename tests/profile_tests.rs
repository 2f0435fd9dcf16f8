// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile and calendar route tests against a mock identity provider and
//! directory.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use directory_profile::services::ConsentState;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

const SIGNIN_SCOPES: &[&str] = &["User.Read", "Calendars.Read"];
const ALL_SCOPES: &[&str] = &["User.Read", "Calendars.Read", "User.ReadWrite"];

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

fn query_value(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
    })
}

async fn body_json_of(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_protected_routes_redirect_to_sign_in() {
    let (app, _) = common::create_test_app();

    for uri in ["/profile", "/calendar"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/account/signin", "{uri}");
    }
}

#[tokio::test]
async fn test_profile_without_write_consent_redirects_to_consent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS65001: The user has not consented"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-1", SIGNIN_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let url = location(&response);
    assert!(url.starts_with(&format!("{}/common/oauth2/v2.0/authorize?", server.uri())));
    assert_eq!(query_value(&url, "prompt").as_deref(), Some("consent"));
    // Only the additional scopes are requested.
    assert_eq!(query_value(&url, "scope").as_deref(), Some("User.ReadWrite"));
    assert_eq!(
        query_value(&url, "redirect_uri"),
        Some(state.config.consent_redirect_uri.clone())
    );

    let encoded_state = query_value(&url, "state").unwrap();
    let consent: ConsentState =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(encoded_state).unwrap()).unwrap();
    assert_eq!(consent.return_path, "/profile");
    assert_eq!(consent.requested_scopes, vec!["User.ReadWrite".to_string()]);
}

#[tokio::test]
async fn test_consent_callback_redeems_code_and_returns_to_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=consent-code"))
        .and(body_string_contains("account%2Fconsent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "expires_in": 3600,
            "scope": "User.Read Calendars.Read User.ReadWrite"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-1", SIGNIN_SCOPES);
    let (session_id, cookie) = common::signed_in_session(&state, &tokens);

    let consent_state = ConsentState {
        requested_scopes: vec!["User.ReadWrite".to_string()],
        return_path: "/profile".to_string(),
    }
    .encode()
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/account/consent?code=consent-code&state={}",
                    consent_state
                ))
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");

    let write_scopes = state.config.profile_write_scopes.clone();
    let acquired = state
        .consent
        .ensure_consent(&session_id, &write_scopes, "/profile")
        .await
        .unwrap();
    assert_eq!(acquired, None);
}

#[tokio::test]
async fn test_consent_callback_does_not_follow_external_return_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-1", SIGNIN_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/account/consent?code=c&state=https%3A%2F%2Fevil.example.com")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_consent_exchange_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Code expired"
        })))
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-1", SIGNIN_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/account/consent?code=stale&state=%2Fprofile")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json_of(response).await;
    assert_eq!(body["error"], "consent_exchange_failed");
}

#[tokio::test]
async fn test_profile_returns_profile_and_missing_photo() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "displayName": "Adele Vance",
            "city": "Seattle",
            "businessPhones": ["+1 425 555 0109"],
            "schools": ["UW", "WSU"],
            "skills": null,
            "interests": ["Hiking"]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/photo/$value"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "ImageNotFound", "message": "The photo wasn't found." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-rw", ALL_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json_of(response).await;
    assert_eq!(body["profile"]["displayName"], "Adele Vance");
    assert_eq!(body["profile"]["city"], "Seattle");
    assert_eq!(body["fullSizePhoto"], Value::Null);
    assert_eq!(body["originalSchools"], "UW;WSU");
    assert_eq!(body["originalSkills"], "");
    assert_eq!(body["originalInterests"], "Hiking");
}

#[tokio::test]
async fn test_profile_update_sends_phone_separately() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/me"))
        .and(body_json(json!({ "city": "Redmond", "skills": ["Rust"] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/me"))
        .and(body_json(json!({ "mobilePhone": "+1 206 555 0100" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-rw", ALL_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let form = json!({
        "mobilePhone": "+1 206 555 0100",
        "originalMobilePhone": "",
        "city": "Redmond",
        "originalCity": "Seattle",
        "aboutMe": "Hello",
        "originalAboutMe": "Hello",
        "schools": ["UW", "WSU"],
        "originalSchools": "WSU;UW",
        "skills": ["Rust"],
        "originalSkills": ""
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/profile/update")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json_of(response).await;
    assert_eq!(body["primary"], json!({ "city": "Redmond", "skills": ["Rust"] }));
    assert_eq!(body["phone"], json!({ "mobilePhone": "+1 206 555 0100" }));

    // The primary update goes first.
    let patches: Vec<Value> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(patches.len(), 2);
    assert!(patches[0].get("city").is_some());
    assert!(patches[1].get("mobilePhone").is_some());
}

#[tokio::test]
async fn test_profile_update_with_no_changes_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-rw", ALL_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let form = json!({
        "city": "Seattle",
        "originalCity": "Seattle",
        "interests": ["Hiking"],
        "originalInterests": "Hiking"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/profile/update")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json_of(response).await;
    assert_eq!(body, json!({ "primary": null, "phone": null }));
}

#[tokio::test]
async fn test_profile_update_stops_at_first_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/me"))
        .and(body_json(json!({ "city": "Redmond" })))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "Authorization_RequestDenied", "message": "Insufficient privileges" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/me"))
        .and(body_json(json!({ "mobilePhone": "+1 206 555 0100" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-rw", ALL_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let form = json!({
        "mobilePhone": "+1 206 555 0100",
        "city": "Redmond",
        "originalCity": "Seattle"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/profile/update")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json_of(response).await;
    assert_eq!(body["error"], "directory_error");
    assert_eq!(body["details"], "HTTP 403: Insufficient privileges");
}

#[tokio::test]
async fn test_calendar_lists_events_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me/events"))
        .and(query_param("$select", "subject,organizer,start,end"))
        .and(query_param("$orderby", "createdDateTime DESC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "subject": "Planning",
                    "organizer": { "emailAddress": { "name": "Megan", "address": "megan@contoso.com" } },
                    "start": { "dateTime": "2026-10-20T09:00:00.0000000", "timeZone": "UTC" },
                    "end": { "dateTime": "2026-10-20T10:00:00.0000000", "timeZone": "UTC" }
                },
                { "subject": "Retro" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let tokens = common::fresh_tokens("access-1", SIGNIN_SCOPES);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/calendar")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json_of(response).await;
    assert_eq!(body[0]["subject"], "Planning");
    assert_eq!(body[0]["organizer"]["emailAddress"]["name"], "Megan");
    assert_eq!(body[1]["subject"], "Retro");
}

#[tokio::test]
async fn test_expired_session_tokens_send_user_to_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, state) = common::create_test_app_with_upstream(&server.uri());
    let mut tokens = common::fresh_tokens("access-1", SIGNIN_SCOPES);
    tokens.expires_at = chrono::Utc::now() - chrono::Duration::minutes(1);
    let (_, cookie) = common::signed_in_session(&state, &tokens);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/calendar")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/account/signin");
}
