//! Session construction from credential and token files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

use drive_sync::error::DriveError;
use drive_sync::models::AuthorizedUserToken;
use drive_sync::Authenticator;

fn write_json(dir: &Path, name: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, value.to_string()).unwrap();
    path
}

fn client_secrets(dir: &Path, token_uri: &str) -> PathBuf {
    write_json(
        dir,
        "credentials.json",
        json!({
            "installed": {
                "client_id": "cid.apps.googleusercontent.com",
                "client_secret": "shh",
                "token_uri": token_uri
            }
        }),
    )
}

fn stored_token(dir: &Path, token_uri: &str, expiry: chrono::DateTime<Utc>) -> PathBuf {
    write_json(
        dir,
        "token.json",
        json!({
            "token": "ya29.stored",
            "refresh_token": "1//refresh",
            "token_uri": token_uri,
            "client_id": "cid.apps.googleusercontent.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/drive"],
            "expiry": expiry.to_rfc3339()
        }),
    )
}

#[tokio::test]
async fn test_missing_credentials_is_fatal() {
    let dir = TempDir::new().unwrap();
    let token_path = dir.path().join("token.json");

    let err = Authenticator::from_paths(&dir.path().join("credentials.json"), &token_path)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, DriveError::CredentialsNotFound(_)));
    assert!(err.to_string().contains("credentials.json not found"));
    assert!(!token_path.exists());
}

#[tokio::test]
async fn test_valid_token_used_without_network() {
    let mut server = Server::new_async().await;
    let token_uri = format!("{}/token", server.url());
    let refresh = server
        .mock("POST", "/token")
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = client_secrets(dir.path(), &token_uri);
    let token_path = stored_token(dir.path(), &token_uri, Utc::now() + Duration::hours(1));

    let auth = Authenticator::from_paths(&credentials, &token_path)
        .await
        .unwrap();
    assert_eq!(auth.access_token().await.unwrap(), "ya29.stored");
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_expired_token_refreshed_and_persisted() {
    let mut server = Server::new_async().await;
    let token_uri = format!("{}/token", server.url());
    let refresh = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
            Matcher::UrlEncoded("client_id".into(), "cid.apps.googleusercontent.com".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"access_token": "ya29.fresh", "expires_in": 3599, "token_type": "Bearer"})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = client_secrets(dir.path(), &token_uri);
    let token_path = stored_token(dir.path(), &token_uri, Utc::now() - Duration::hours(1));

    let auth = Authenticator::from_paths(&credentials, &token_path)
        .await
        .unwrap();
    assert_eq!(auth.access_token().await.unwrap(), "ya29.fresh");
    refresh.assert_async().await;

    let saved: AuthorizedUserToken =
        serde_json::from_str(&fs::read_to_string(&token_path).unwrap()).unwrap();
    assert_eq!(saved.token.as_deref(), Some("ya29.fresh"));
    assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
    assert!(saved.expiry.unwrap() > Utc::now());
}

#[tokio::test]
async fn test_refresh_during_run_is_persisted() {
    let mut server = Server::new_async().await;
    let token_uri = format!("{}/token", server.url());
    let first = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"access_token": "ya29.short", "expires_in": 30, "refresh_token": "1//rotated"})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("refresh_token".into(), "1//rotated".into()))
        .with_header("content-type", "application/json")
        .with_body(json!({"access_token": "ya29.second", "expires_in": 3599}).to_string())
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = client_secrets(dir.path(), &token_uri);
    let token_path = stored_token(dir.path(), &token_uri, Utc::now() - Duration::hours(1));

    // The token from startup expires inside the skew window, so the first
    // request refreshes again.
    let auth = Authenticator::from_paths(&credentials, &token_path)
        .await
        .unwrap();
    assert_eq!(auth.access_token().await.unwrap(), "ya29.second");
    first.assert_async().await;
    second.assert_async().await;

    let saved: AuthorizedUserToken =
        serde_json::from_str(&fs::read_to_string(&token_path).unwrap()).unwrap();
    assert_eq!(saved.token.as_deref(), Some("ya29.second"));
    assert_eq!(saved.refresh_token.as_deref(), Some("1//rotated"));

    // Cached now; no further refresh.
    assert_eq!(auth.access_token().await.unwrap(), "ya29.second");
}

#[tokio::test]
async fn test_refresh_failure_is_fatal() {
    let mut server = Server::new_async().await;
    let token_uri = format!("{}/token", server.url());
    server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(json!({"error": "invalid_grant"}).to_string())
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let credentials = client_secrets(dir.path(), &token_uri);
    let token_path = stored_token(dir.path(), &token_uri, Utc::now() - Duration::hours(1));
    let before = fs::read_to_string(&token_path).unwrap();

    let err = Authenticator::from_paths(&credentials, &token_path)
        .await
        .err()
        .unwrap();

    match &err {
        DriveError::TokenRefreshError(message) => assert!(message.contains("invalid_grant")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_to_string(&token_path).unwrap(), before);
}

#[tokio::test]
async fn test_service_account_key_detected() {
    let dir = TempDir::new().unwrap();
    let credentials = write_json(
        dir.path(),
        "credentials.json",
        json!({
            "type": "service_account",
            "client_email": "sync@project.iam.gserviceaccount.com",
            "private_key": "not a pem key",
            "token_uri": "http://127.0.0.1:9/token"
        }),
    );
    let token_path = dir.path().join("token.json");

    let auth = Authenticator::from_paths(&credentials, &token_path)
        .await
        .unwrap();
    assert!(!token_path.exists());

    let err = auth.access_token().await.unwrap_err();
    assert!(matches!(err, DriveError::JwtError(_)));
}

#[tokio::test]
async fn test_malformed_credentials_rejected() {
    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials.json");
    fs::write(&credentials, "not valid json").unwrap();

    let result = Authenticator::from_paths(&credentials, &dir.path().join("token.json")).await;
    assert!(matches!(result, Err(DriveError::Json(_))));
}
