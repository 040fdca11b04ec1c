//! Interactive OAuth consent over a loopback redirect.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DriveError, Result};
use crate::models::{AuthorizedUserToken, ClientSecrets, TokenResponse};

const SUCCESS_PAGE: &str =
    "The authentication flow has completed. You may close this window.";

/// Run the installed-app flow and return a fresh authorized-user token.
///
/// Binds an ephemeral loopback port, prints the consent URL and blocks until
/// the browser is redirected back with an authorization code.
pub async fn authorize(
    client: &Client,
    secrets: &ClientSecrets,
    scope: &str,
) -> Result<AuthorizedUserToken> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://localhost:{}/", port);
    let state = Uuid::new_v4().simple().to_string();

    let url = authorize_url(secrets, &redirect_uri, scope, &state)?;
    println!("Please visit this URL to authorize this application: {}", url);

    let code = wait_for_code(listener, &state).await?;
    exchange_code(client, secrets, &code, &redirect_uri, scope).await
}

/// Build the consent URL the user opens in a browser.
pub fn authorize_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> Result<Url> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| DriveError::AuthenticationError(format!("invalid auth_uri: {}", e)))
}

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>,
}

/// Serve the redirect URI until a request carries a code or an error.
///
/// Unrelated requests (a favicon fetch, a bare `/`) get a 404 and the
/// listener keeps waiting. The server shuts down once the outcome is known.
pub async fn wait_for_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let state = RedirectState {
        expected_state: Arc::from(expected_state),
        outcome: Arc::new(Mutex::new(Some(outcome_tx))),
    };
    let app = Router::new()
        .route("/", get(handle_redirect))
        .with_state(state);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = outcome_rx.await.map_err(|_| {
        DriveError::AuthenticationError("redirect listener stopped before consent".to_string())
    });
    let _ = stop_tx.send(());
    match server.await {
        Ok(Err(e)) => debug!("redirect listener: {}", e),
        Err(e) => debug!("redirect listener task: {}", e),
        Ok(Ok(())) => {}
    }

    outcome?
}

async fn handle_redirect(
    State(state): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let Some(outcome) = parse_redirect(&params, &state.expected_state) else {
        return (StatusCode::NOT_FOUND, String::new());
    };
    debug!(ok = outcome.is_ok(), "redirect received");

    let reply = match &outcome {
        Ok(_) => (StatusCode::OK, SUCCESS_PAGE.to_string()),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Some(sender) = state.outcome.lock().await.take() {
        let _ = sender.send(outcome);
    }
    reply
}

/// Interpret the query of a redirect request.
///
/// `None` means the request carries neither a code nor an error.
fn parse_redirect(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Option<Result<String>> {
    if let Some(error) = params.get("error") {
        return Some(Err(DriveError::AuthenticationError(format!(
            "consent was not granted: {}",
            error
        ))));
    }

    let code = params.get("code")?;
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Some(Err(DriveError::AuthenticationError(
            "state mismatch in OAuth redirect".to_string(),
        )));
    }
    Some(Ok(code.clone()))
}

/// Exchange an authorization code at the token endpoint.
pub async fn exchange_code(
    client: &Client,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
    scope: &str,
) -> Result<AuthorizedUserToken> {
    let params = [
        ("code", code),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];

    let response = client.post(&secrets.token_uri).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::AuthenticationError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response.json().await?;
    Ok(AuthorizedUserToken {
        token: Some(token_response.access_token),
        refresh_token: token_response.refresh_token,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: vec![scope.to_string()],
        expiry: Some(
            chrono::Utc::now() + chrono::Duration::seconds(token_response.expires_in as i64),
        ),
    })
}
