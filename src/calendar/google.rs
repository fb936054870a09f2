//! Minimal Google Calendar v3 client.
//!
//! Supports two credential shapes:
//! - a service-account key (`"type": "service_account"`), exchanged for an
//!   access token with a signed RS256 JWT assertion;
//! - an OAuth client (`installed` or `web`) plus a token file holding a
//!   `refresh_token`, refreshed against the token endpoint.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::CalendarEvent;
use crate::config::CalendarConfig;

const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Credentials loaded from disk.
#[derive(Clone)]
pub enum GoogleCredentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServiceAccount(key) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .finish_non_exhaustive(),
            Self::AuthorizedUser(user) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &user.client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Clone)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: Option<String>,
    /// Access token already present in the token file, if still usable.
    pub cached: Option<CachedToken>,
}

#[derive(Deserialize)]
struct OAuthClientFile {
    #[serde(default)]
    installed: Option<OAuthClient>,
    #[serde(default)]
    web: Option<OAuthClient>,
}

#[derive(Deserialize)]
struct OAuthClient {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Deserialize)]
struct TokenFile {
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    expiry_date: Option<i64>,
}

/// Load credentials named by `config`.
///
/// Returns `Ok(None)` when the files needed are absent, so calendar sync is
/// simply unavailable. Malformed files are errors.
pub fn load_credentials(config: &CalendarConfig) -> anyhow::Result<Option<GoogleCredentials>> {
    let creds_path = &config.credentials_path;
    if !creds_path.exists() {
        tracing::info!(
            "google calendar: no credentials file at {}, sync disabled",
            creds_path.display()
        );
        return Ok(None);
    }
    let raw = std::fs::read_to_string(creds_path)
        .with_context(|| format!("reading {}", creds_path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", creds_path.display()))?;

    if value.get("type").and_then(|t| t.as_str()) == Some("service_account") {
        let key: ServiceAccountKey =
            serde_json::from_value(value).context("invalid service account key")?;
        return Ok(Some(GoogleCredentials::ServiceAccount(key)));
    }

    let client_file: OAuthClientFile =
        serde_json::from_value(value).context("invalid OAuth client file")?;
    let client = client_file
        .installed
        .or(client_file.web)
        .context("OAuth client file has neither `installed` nor `web` section")?;

    let Some(token) = read_token_file(&config.token_path)? else {
        tracing::warn!(
            "google calendar: credentials found but no token file at {}",
            config.token_path.display()
        );
        return Ok(None);
    };
    let Some(refresh_token) = token.refresh_token.filter(|t| !t.trim().is_empty()) else {
        anyhow::bail!(
            "token file {} has no refresh_token",
            config.token_path.display()
        );
    };
    let cached = match (token.access_token, token.expiry_date) {
        (Some(value), Some(ms)) => {
            DateTime::from_timestamp_millis(ms).map(|expires_at| CachedToken { value, expires_at })
        }
        _ => None,
    };

    Ok(Some(GoogleCredentials::AuthorizedUser(AuthorizedUser {
        client_id: client.client_id,
        client_secret: client.client_secret,
        refresh_token,
        token_uri: client.token_uri,
        cached,
    })))
}

fn read_token_file(path: &Path) -> anyhow::Result<Option<TokenFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let token =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(token))
}

/// A bearer token and its expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Deserialize)]
struct EventResponse {
    id: String,
}

/// Authenticated Calendar v3 client bound to one calendar.
pub struct GoogleCalendarClient {
    api_base: String,
    calendar_id: String,
    token_uri_override: Option<String>,
    credentials: GoogleCredentials,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleCalendarClient {
    pub fn new(
        config: &CalendarConfig,
        credentials: GoogleCredentials,
        client: reqwest::Client,
    ) -> Self {
        let initial = match &credentials {
            GoogleCredentials::AuthorizedUser(user) => user.cached.clone(),
            GoogleCredentials::ServiceAccount(_) => None,
        };
        Self {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            calendar_id: config.calendar_id.trim().to_owned(),
            token_uri_override: config.token_uri.clone(),
            credentials,
            client,
            token: Mutex::new(initial),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    fn token_uri<'a>(&'a self, from_credentials: Option<&'a str>) -> &'a str {
        self.token_uri_override
            .as_deref()
            .or(from_credentials)
            .unwrap_or(DEFAULT_TOKEN_URI)
    }

    /// Current access token, refreshing when missing or about to expire.
    async fn access_token(&self) -> anyhow::Result<String> {
        let mut guard = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let response = match &self.credentials {
            GoogleCredentials::ServiceAccount(key) => {
                let token_uri = self.token_uri(key.token_uri.as_deref());
                let assertion = sign_assertion(key, token_uri, now)?;
                self.client
                    .post(token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()
                    .await?
            }
            GoogleCredentials::AuthorizedUser(user) => {
                let token_uri = self.token_uri(user.token_uri.as_deref());
                self.client
                    .post(token_uri)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", user.client_id.as_str()),
                        ("client_secret", user.client_secret.as_str()),
                        ("refresh_token", user.refresh_token.as_str()),
                    ])
                    .send()
                    .await?
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("google token request failed ({status}): {body}");
        }
        let parsed: TokenResponse = response.json().await.context("invalid token response")?;
        let token = CachedToken {
            value: parsed.access_token,
            expires_at: now + Duration::seconds(parsed.expires_in),
        };
        tracing::debug!(expires_at = %token.expires_at, "google access token refreshed");
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Create an event and return its id.
    pub async fn insert_event(&self, event: &CalendarEvent) -> anyhow::Result<String> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(token)
            .json(event)
            .send()
            .await?;
        read_event_id(response, "insert").await
    }

    /// Replace an existing event and return its id.
    pub async fn update_event(
        &self,
        event_id: &str,
        event: &CalendarEvent,
    ) -> anyhow::Result<String> {
        let token = self.access_token().await?;
        let response = self
            .client
            .put(self.event_url(event_id))
            .bearer_auth(token)
            .json(event)
            .send()
            .await?;
        read_event_id(response, "update").await
    }

    /// Delete an event. An event that is already gone counts as deleted.
    pub async fn delete_event(&self, event_id: &str) -> anyhow::Result<()> {
        let token = self.access_token().await?;
        let response = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success()
            || status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::GONE
        {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("calendar delete failed ({status}): {body}")
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    token_uri: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let iat = now.timestamp();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: CALENDAR_SCOPE,
        aud: token_uri,
        iat,
        exp: iat + 3600,
    };
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("service account private_key is not a valid RSA PEM")?;
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &encoding_key,
    )
    .context("signing service account assertion")
}

async fn read_event_id(response: reqwest::Response, op: &str) -> anyhow::Result<String> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("calendar {op} failed ({status}): {body}");
    }
    let parsed: EventResponse = response
        .json()
        .await
        .with_context(|| format!("invalid calendar {op} response"))?;
    Ok(parsed.id)
}
