use crate::config::ServiceAccount;
use crate::error::{SheetError, SheetResult};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_TTL_SECONDS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims of the self-signed assertion exchanged for an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_TTL_SECONDS
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Sign the RS256 assertion for the service account.
pub fn build_assertion(account: &ServiceAccount, token_uri: &str) -> SheetResult<String> {
    let iat = unix_seconds()?;
    let claims = AssertionClaims {
        iss: account.client_email.clone(),
        scope: SHEETS_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat,
        exp: iat + ASSERTION_TTL_SECONDS,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
        .map_err(|e| SheetError::Auth(format!("invalid private key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| SheetError::Auth(e.to_string()))
}

fn unix_seconds() -> SheetResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| SheetError::Auth("invalid system clock".to_string()))
}

/// Access tokens for the service account, fetched on demand and reused
/// until shortly before they expire.
pub struct TokenProvider {
    account: Option<ServiceAccount>,
    token_uri: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(account: Option<ServiceAccount>, token_uri: impl Into<String>) -> Self {
        TokenProvider {
            account,
            token_uri: token_uri.into(),
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self, http: &reqwest::Client) -> SheetResult<String> {
        let account = self.account.as_ref().ok_or_else(|| {
            SheetError::Config("Missing Google service account env".to_string())
        })?;

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = build_assertion(account, &self.token_uri)?;
        log::debug!("requesting access token for {}", account.client_email);
        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = token_error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(SheetError::Auth(message));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

/// OAuth error bodies carry `error` and, usually, `error_description`.
fn token_error_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "error"]
        .iter()
        .find_map(|key| parsed.get(*key)?.as_str().map(str::to_string))
}
