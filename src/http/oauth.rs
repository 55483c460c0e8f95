//! Raindrop.io OAuth authorization-code flow
//!
//! `/auth/raindrop` redirects the browser to Raindrop.io; the callback swaps
//! the returned code for an access token and hands it back as JSON.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::OAuthConfig;
use crate::errors::AppError;
use crate::AppState;

pub struct OAuthClient {
    http: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfig, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::internal(format!("failed to build oauth client: {err}")))?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            base_url: config.base_url.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some()
    }

    /// `None` when no client id is configured.
    pub fn authorize_url(&self) -> Option<Result<Url, AppError>> {
        let client_id = self.client_id.as_deref()?;
        let url = Url::parse_with_params(
            &format!("{}/oauth/authorize", self.base_url),
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", "read write"),
            ],
        )
        .map_err(|err| AppError::internal(format!("invalid oauth authorize url: {err}")));
        Some(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| {
                AppError::bad_request("oauth_not_configured", "RAINDROP_CLIENT_ID not set")
            })?;

        let response = self
            .http
            .post(format!("{}/oauth/access_token", self.base_url))
            .json(&TokenRequest {
                grant_type: "authorization_code",
                code,
                client_id,
                client_secret: self.client_secret.as_deref().unwrap_or_default(),
                redirect_uri: &self.redirect_uri,
            })
            .send()
            .await
            .map_err(|err| {
                AppError::upstream(None, format!("OAuth token exchange failed: {err}"))
            })?;

        let status = response.status();
        let body: TokenResponse = response.json().await.map_err(|err| {
            AppError::upstream(
                Some(status.as_u16()),
                format!("OAuth token exchange failed: {err}"),
            )
        })?;

        match body.access_token {
            Some(token) if status.is_success() => Ok(token),
            _ => Err(AppError::upstream(
                Some(status.as_u16()),
                body.error_description
                    .or(body.error)
                    .unwrap_or_else(|| "OAuth token exchange failed".to_string()),
            )),
        }
    }
}

pub async fn authorize(State(state): State<AppState>) -> Response {
    match state.oauth.authorize_url() {
        None => (StatusCode::INTERNAL_SERVER_ERROR, "RAINDROP_CLIENT_ID not set").into_response(),
        Some(Err(err)) => err.into_response(),
        Some(Ok(url)) => (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response(),
    }
}

pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(code) = params.code.filter(|code| !code.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing code parameter").into_response();
    };

    match state.oauth.exchange_code(&code).await {
        Ok(access_token) => {
            info!("oauth token exchange succeeded");
            Json(json!({ "access_token": access_token })).into_response()
        }
        Err(err) => {
            warn!(error = %err, "oauth token exchange failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.public_message() })),
            )
                .into_response()
        }
    }
}
