//! Session authentication for Google APIs.
//!
//! Two credential kinds are supported:
//! - an OAuth client secrets file (`credentials.json`) plus a persisted
//!   authorized-user token (`token.json`), refreshed or re-consented as needed;
//! - a service account key, exchanged for tokens with a signed JWT.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::consent;
use crate::error::{DriveError, Result};
use crate::models::{
    default_token_uri, AuthorizedUserToken, ClientSecretsFile, ServiceAccountCredentials,
    TokenResponse,
};

/// Google Drive API scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens closer than this to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS),
            None => true,
        }
    }
}

enum TokenSource {
    Static,
    ServiceAccount(ServiceAccountCredentials),
    AuthorizedUser {
        token: RwLock<AuthorizedUserToken>,
        path: PathBuf,
    },
}

/// Produces bearer tokens for Drive requests.
///
/// Built once at startup and shared by reference; cloning is cheap.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Build a session from a credentials file and a token file.
    ///
    /// Fails with [`DriveError::CredentialsNotFound`] before any network call
    /// if `credentials_path` is missing. For client secrets, a still-valid
    /// token from `token_path` is used as is; an expired one is refreshed and
    /// anything else falls through to the interactive consent flow. The
    /// resulting token is written back to `token_path`.
    pub async fn from_paths(credentials_path: &Path, token_path: &Path) -> Result<Self> {
        if !credentials_path.exists() {
            return Err(DriveError::CredentialsNotFound(
                credentials_path.display().to_string(),
            ));
        }

        let content = fs::read_to_string(credentials_path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        if value.get("type").and_then(|t| t.as_str()) == Some("service_account") {
            debug!(path = %credentials_path.display(), "using service account credentials");
            let credentials: ServiceAccountCredentials = serde_json::from_value(value)?;
            return Ok(Self::from_service_account(credentials));
        }

        let secrets = serde_json::from_value::<ClientSecretsFile>(value)?.into_inner();
        let client = Client::new();

        let token = match load_token(token_path) {
            Some(token) if token.is_valid(Duration::seconds(EXPIRY_SKEW_SECS)) => {
                debug!(path = %token_path.display(), "using stored token");
                return Ok(Self::from_authorized_user(client, token, token_path));
            }
            Some(token) if token.refresh_token.is_some() => {
                info!("Refreshing expired token");
                refresh_authorized_user(&client, &token).await?
            }
            _ => consent::authorize(&client, &secrets, DRIVE_SCOPE)
                .await
                .map_err(|e| match e {
                    e @ DriveError::AuthenticationError(_) => e,
                    other => DriveError::AuthenticationError(other.to_string()),
                })?,
        };

        save_token(token_path, &token)?;
        Ok(Self::from_authorized_user(client, token, token_path))
    }

    /// Create an authenticator from service account credentials.
    pub fn from_service_account(credentials: ServiceAccountCredentials) -> Self {
        Self {
            source: Arc::new(TokenSource::ServiceAccount(credentials)),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an authenticator that always hands out `access_token`.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        let cached = CachedToken {
            access_token: access_token.into(),
            expires_at: None,
        };
        Self {
            source: Arc::new(TokenSource::Static),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(Some(cached))),
        }
    }

    fn from_authorized_user(client: Client, token: AuthorizedUserToken, path: &Path) -> Self {
        let cached = token.token.clone().map(|access_token| CachedToken {
            access_token,
            expires_at: token.expiry,
        });
        Self {
            source: Arc::new(TokenSource::AuthorizedUser {
                token: RwLock::new(token),
                path: path.to_path_buf(),
            }),
            client,
            cached_token: Arc::new(RwLock::new(cached)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// A refreshed authorized-user token is written back to its token file.
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_fresh() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = match self.source.as_ref() {
            TokenSource::ServiceAccount(credentials) => {
                self.service_account_token(credentials).await?
            }
            TokenSource::AuthorizedUser { token, path } => {
                let mut current = token.write().await;
                let refreshed = refresh_authorized_user(&self.client, &current).await?;
                save_token(path, &refreshed)?;
                let cached = CachedToken {
                    access_token: refreshed.token.clone().unwrap_or_default(),
                    expires_at: refreshed.expiry,
                };
                *current = refreshed;
                cached
            }
            TokenSource::Static => {
                return Err(DriveError::AuthenticationError(
                    "static access token is missing".to_string(),
                ))
            }
        };

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn service_account_token(
        &self,
        credentials: &ServiceAccountCredentials,
    ) -> Result<CachedToken> {
        let now = Utc::now().timestamp().max(0) as u64;
        let token_uri = credentials
            .token_uri
            .clone()
            .unwrap_or_else(default_token_uri);

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];

        let response = self.client.post(&token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: Some(expiry_from_now(token_response.expires_in)),
        })
    }
}

fn expiry_from_now(expires_in: u64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in as i64)
}

/// Load a persisted token; unreadable or malformed files are ignored.
fn load_token(path: &Path) -> Option<AuthorizedUserToken> {
    if !path.exists() {
        return None;
    }
    let parsed = fs::read_to_string(path)
        .map_err(DriveError::from)
        .and_then(|content| serde_json::from_str(&content).map_err(DriveError::from));
    match parsed {
        Ok(token) => Some(token),
        Err(e) => {
            warn!("Error loading {}: {}", path.display(), e);
            None
        }
    }
}

/// Persist a token so the next run can skip the consent flow.
pub fn save_token(path: &Path, token: &AuthorizedUserToken) -> Result<()> {
    let json = serde_json::to_string_pretty(token)?;
    fs::write(path, json)?;
    debug!(path = %path.display(), "saved token");
    Ok(())
}

/// Trade a refresh token for a new access token.
///
/// Every failure, transport included, is reported as a refresh failure.
pub async fn refresh_authorized_user(
    client: &Client,
    token: &AuthorizedUserToken,
) -> Result<AuthorizedUserToken> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .ok_or_else(|| DriveError::TokenRefreshError("no refresh token".to_string()))?;

    let params = [
        ("client_id", token.client_id.as_str()),
        ("client_secret", token.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    let response = client
        .post(&token.token_uri)
        .form(&params)
        .send()
        .await
        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

    Ok(AuthorizedUserToken {
        token: Some(token_response.access_token),
        refresh_token: token_response
            .refresh_token
            .or_else(|| token.refresh_token.clone()),
        expiry: Some(expiry_from_now(token_response.expires_in)),
        ..token.clone()
    })
}
