//! OAuth credential handling for the calendar provider.
//!
//! A single `TokenStore` owns the process-wide token: it is loaded lazily
//! from a JSON file, refreshed with the refresh token when it nears expiry,
//! and written back after every refresh or code exchange.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mentor_core::config::{CalendarConfig, GeneralConfig};
use mentor_core::error::{MentorError, Result};

/// Read-only calendar access is all the assistant ever needs.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Token as persisted on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expires_at - chrono::Duration::seconds(EXPIRY_SKEW_SECS) > now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// OAuth client registration (id and secret).
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

pub struct TokenStore {
    path: PathBuf,
    token_url: String,
    auth_url: String,
    redirect_uri: String,
    client: Option<ClientCredentials>,
    http: reqwest::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl TokenStore {
    pub fn new(
        path: impl Into<PathBuf>,
        config: &CalendarConfig,
        client: Option<ClientCredentials>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MentorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            path: path.into(),
            token_url: config.token_url.clone(),
            auth_url: config.auth_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            client,
            http,
            cached: Mutex::new(None),
        })
    }

    /// Token store at the configured path with client credentials from the
    /// environment.
    pub fn from_config(general: &GeneralConfig, config: &CalendarConfig) -> Result<Self> {
        let client = config
            .client_credentials()
            .map(|(client_id, client_secret)| ClientCredentials {
                client_id,
                client_secret,
            });
        if client.is_none() {
            debug!("Calendar client credentials not set");
        }
        Self::new(general.resolve(&config.token_file), config, client)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A valid access token, refreshing it first if needed.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.load_file()?;
        }

        let token = cached.as_ref().ok_or_else(|| {
            MentorError::AuthRequired("calendar is not connected".to_string())
        })?;
        if token.is_fresh(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            MentorError::AuthRequired("calendar token expired and cannot be refreshed".to_string())
        })?;
        let refreshed = self.refresh(&refresh_token).await?;
        self.persist(&refreshed)?;
        let access = refreshed.access_token.clone();
        *cached = Some(refreshed);
        info!("Calendar access token refreshed");
        Ok(access)
    }

    /// Forget the cached access token so the next call refreshes it.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_mut() {
            token.access_token.clear();
        }
    }

    /// Consent screen URL the user opens to connect their calendar.
    pub fn authorization_url(&self) -> Result<String> {
        let client = self.require_client()?;
        let url = reqwest::Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| MentorError::Config(format!("Invalid auth_url: {}", e)))?;
        Ok(url.into())
    }

    /// Trade an authorization code for tokens and persist them.
    pub async fn exchange_code(&self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(MentorError::InvalidInput(
                "authorization code must not be empty".to_string(),
            ));
        }
        let client = self.require_client()?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let token = self.request_token(&form, None).await?;
        if token.refresh_token.is_none() {
            warn!("Token response carried no refresh token; re-consent will be needed on expiry");
        }
        self.persist(&token)?;
        *self.cached.lock().await = Some(token);
        info!(path = %self.path.display(), "Calendar connected");
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let client = self.require_client()?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];
        self.request_token(&form, Some(refresh_token)).await
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<StoredToken> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| MentorError::ProviderUnavailable(format!("token endpoint: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(MentorError::ProviderUnavailable(format!(
                    "token endpoint returned {}",
                    status
                )));
            }
            warn!(status = status.as_u16(), "Token grant rejected");
            return Err(MentorError::AuthRequired(format!(
                "token grant rejected ({}): {}",
                status, body
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            MentorError::ProviderUnavailable(format!("malformed token response: {}", e))
        })?;

        Ok(StoredToken {
            access_token: parsed.access_token,
            refresh_token: parsed
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in.unwrap_or(3600)),
        })
    }

    fn require_client(&self) -> Result<&ClientCredentials> {
        self.client.as_ref().ok_or_else(|| {
            MentorError::AuthRequired("calendar client id and secret are not configured".to_string())
        })
    }

    fn load_file(&self) -> Result<Option<StoredToken>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable calendar token file");
                Ok(None)
            }
        }
    }

    fn persist(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("path", &self.path)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, client: bool) -> TokenStore {
        let client = client.then(|| ClientCredentials {
            client_id: "id-123".to_string(),
            client_secret: "secret".to_string(),
        });
        TokenStore::new(dir.join("token.json"), &CalendarConfig::default(), client).unwrap()
    }

    fn write_token(path: &Path, token: &StoredToken) {
        std::fs::write(path, serde_json::to_string(token).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_requires_auth() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path(), true).access_token().await.unwrap_err();
        assert!(matches!(err, MentorError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn test_fresh_token_is_served_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), false);
        write_token(
            s.path(),
            &StoredToken {
                access_token: "ya29.fresh".to_string(),
                refresh_token: None,
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        );
        assert_eq!(s.access_token().await.unwrap(), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_requires_auth() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), true);
        write_token(
            s.path(),
            &StoredToken {
                access_token: "old".to_string(),
                refresh_token: None,
                expires_at: Utc::now() + chrono::Duration::seconds(30),
            },
        );
        let err = s.access_token().await.unwrap_err();
        assert!(matches!(err, MentorError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn test_refresh_without_client_requires_auth() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path(), false);
        write_token(
            s.path(),
            &StoredToken {
                access_token: "old".to_string(),
                refresh_token: Some("1//refresh".to_string()),
                expires_at: Utc::now() - chrono::Duration::hours(1),
            },
        );
        let err = s.access_token().await.unwrap_err();
        assert!(matches!(err, MentorError::AuthRequired(_)));
    }

    #[test]
    fn test_authorization_url_carries_client_and_scope() {
        let dir = tempfile::tempdir().unwrap();
        let url = store(dir.path(), true).authorization_url().unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=id-123"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("calendar.readonly"));
    }

    #[test]
    fn test_authorization_url_needs_client() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path(), false).authorization_url().unwrap_err();
        assert!(matches!(err, MentorError::AuthRequired(_)));
    }
}
