//! OAuth bearer tokens for the publishing API.
//!
//! The service-account key signs a JWT assertion which the key's token endpoint
//! exchanges for a short-lived access token (RFC 7523 bearer grant).

mod service_account;

pub use service_account::{DEFAULT_TOKEN_URI, ServiceAccountKey};

use crate::config::Credential;
use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

/// OAuth scope for the Android Publisher API
pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens this close to expiry are refreshed before use
const REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Longest `expires_in` accepted from a token endpoint
const MAX_TOKEN_LIFETIME_SECS: i64 = 86_400;

/// A bearer token and its expiry
#[derive(Clone)]
pub struct AccessToken {
    /// Token value sent in the `Authorization` header
    pub value: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Usable at `now` with the refresh margin to spare
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Holds the loaded key and the current token
#[derive(Debug)]
pub struct TokenCache {
    state: Mutex<Option<(ServiceAccountKey, AccessToken)>>,
    timeout: StdDuration,
}

impl TokenCache {
    /// Empty cache whose token requests give up after `timeout`
    pub fn new(timeout: StdDuration) -> Self {
        Self {
            state: Mutex::new(None),
            timeout,
        }
    }

    /// Load the credential and obtain a first token
    pub async fn authenticate(
        &self,
        http: &reqwest::Client,
        credential: &Credential,
    ) -> Result<DateTime<Utc>, AuthError> {
        let key = ServiceAccountKey::from_file(&credential.path)?;
        log::debug!(
            "Exchanging assertion for {} at {}",
            key.client_email,
            key.token_uri
        );
        let token = exchange_token(http, &key, Utc::now(), self.timeout).await?;
        let expires_at = token.expires_at;
        self.store(key, token);
        Ok(expires_at)
    }

    /// Current bearer value, refreshed first if it is about to expire
    pub async fn bearer(&self, http: &reqwest::Client) -> Result<String, AuthError> {
        let now = Utc::now();
        let key = {
            let guard = self.state.lock().map_err(|_| AuthError::NotAuthenticated)?;
            match guard.as_ref() {
                None => return Err(AuthError::NotAuthenticated),
                Some((_, token)) if token.is_fresh(now) => return Ok(token.value.clone()),
                Some((key, _)) => key.clone(),
            }
        };

        log::info!("Access token near expiry; refreshing");
        let token = exchange_token(http, &key, now, self.timeout).await?;
        let value = token.value.clone();
        self.store(key, token);
        Ok(value)
    }

    fn store(&self, key: ServiceAccountKey, token: AccessToken) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = Some((key, token));
        }
    }
}

/// Exchange a signed assertion for an access token.
///
/// The whole exchange, response body included, is bounded by `timeout`.
pub async fn exchange_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    now: DateTime<Utc>,
    timeout: StdDuration,
) -> Result<AccessToken, AuthError> {
    let assertion = key.assertion(ANDROID_PUBLISHER_SCOPE, now)?;

    let response = http
        .post(&key.token_uri)
        .timeout(timeout)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| AuthError::Exchange {
            transient: e.is_connect() || e.is_timeout(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| AuthError::Exchange {
        transient: e.is_timeout(),
        reason: format!("failed to read token response: {}", e),
    })?;

    if !status.is_success() {
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message: token_error_message(&body),
        });
    }

    parse_token_response(&body, now)
}

fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<AccessToken, AuthError> {
    let parsed: TokenResponse = serde_json::from_str(body).map_err(|e| AuthError::Exchange {
        reason: format!("unexpected token response: {}", e),
        transient: false,
    })?;

    if parsed.access_token.is_empty() {
        return Err(AuthError::Exchange {
            reason: "token endpoint returned an empty access_token".to_string(),
            transient: false,
        });
    }

    let expires_in = parsed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    let invalid_lifetime = || AuthError::Exchange {
        reason: format!("token endpoint returned an invalid expires_in of {}", expires_in),
        transient: false,
    };
    if !(1..=MAX_TOKEN_LIFETIME_SECS).contains(&expires_in) {
        return Err(invalid_lifetime());
    }
    let expires_at = Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(invalid_lifetime)?;

    Ok(AccessToken {
        value: parsed.access_token,
        expires_at,
    })
}

fn token_error_message(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(error) => match error.error_description {
            Some(description) => format!("{}: {}", error.error, description),
            None => error.error,
        },
        Err(_) => body.trim().to_string(),
    }
}
