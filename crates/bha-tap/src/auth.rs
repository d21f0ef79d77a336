//! Bearer-token HTTP session with transparent refresh
//!
//! Every request goes through [`Session::send`]. The access token is refreshed
//! before the request when it is known to expire within a minute, or after the
//! request when the server answers 401/403. A request triggers at most one
//! refresh and is replayed at most once.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, TapError};

/// Microsoft identity platform token endpoint used by the Bing Ads APIs
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Scope requested on refresh
pub const DEFAULT_SCOPE: &str = "https://ads.microsoft.com/msads.manage offline_access";

/// Default timeout for API requests in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Tokens expiring within this window are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth credentials for the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub client_id: String,
    /// Expiry of `access_token`, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            client_id: client_id.into(),
            expires_at: None,
        }
    }

    /// True when the access token is missing or about to expire
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => expires_at <= now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS),
            None => false,
        }
    }
}

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub token_url: String,
    pub scope: String,
    /// Sent as the `DeveloperToken` header when set
    pub developer_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            developer_token: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Authenticated HTTP session
pub struct Session {
    client: Client,
    config: SessionConfig,
    credentials: Mutex<Credentials>,
}

impl Session {
    /// Build a session around the given credentials
    pub fn acquire(credentials: Credentials, config: SessionConfig) -> Result<Self> {
        if credentials.client_id.is_empty() {
            return Err(TapError::config("client_id is required"));
        }
        if credentials.refresh_token.is_empty() && credentials.access_token.is_empty() {
            return Err(TapError::config(
                "either access_token or refresh_token is required",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("tap-bing-hotel-ads/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            credentials: Mutex::new(credentials),
        })
    }

    /// Snapshot of the current credentials, including any refreshed pair
    pub async fn credentials(&self) -> Credentials {
        self.credentials.lock().await.clone()
    }

    /// GET `url` with bearer auth
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.send(|client| client.get(url)).await
    }

    /// POST a JSON body to `url` with bearer auth
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response> {
        self.send(|client| client.post(url).json(body)).await
    }

    /// GET `url` on the shared client without credentials.
    ///
    /// Report download links are pre-signed and must not carry the bearer
    /// or developer token.
    pub async fn get_unauthenticated(&self, url: &str) -> Result<Response> {
        Ok(self.client.get(url).send().await?)
    }

    /// Send a request, refreshing the token at most once.
    ///
    /// `build` is called once per attempt because a sent request cannot be
    /// replayed.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut refreshed = false;

        if self.credentials.lock().await.needs_refresh(Utc::now()) {
            debug!("Access token expired or expiring, refreshing before request");
            self.refresh().await?;
            refreshed = true;
        }

        let response = self.dispatch(&build).await?;

        if is_auth_failure(response.status()) && !refreshed {
            warn!(status = %response.status(), "Request rejected, refreshing access token");
            self.refresh().await?;
            return self.dispatch(&build).await;
        }

        Ok(response)
    }

    async fn dispatch<F>(&self, build: &F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.credentials.lock().await.access_token.clone();

        let mut request = build(&self.client).bearer_auth(token);
        if let Some(ref developer_token) = self.config.developer_token {
            request = request.header("DeveloperToken", developer_token);
        }

        Ok(request.send().await?)
    }

    /// Exchange the refresh token for a new token pair
    async fn refresh(&self) -> Result<()> {
        let mut credentials = self.credentials.lock().await;

        if credentials.refresh_token.is_empty() {
            return Err(TapError::auth("no refresh token available"));
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", credentials.client_id.as_str()),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("scope", self.config.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TapError::auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TapError::auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TapError::auth(format!("invalid token response: {e}")))?;

        credentials.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token {
            credentials.refresh_token = refresh_token;
        }
        credentials.expires_at = token
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        info!(expires_at = ?credentials.expires_at, "Access token refreshed");
        Ok(())
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
