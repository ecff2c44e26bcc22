//! Google service-account JSON keys and the signed JWT assertion.

use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Token endpoint used when the key file does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for each assertion; Google caps it at one hour
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Fields of a service-account key file that the token exchange needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Key type; `service_account` for valid keys
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    /// Service-account e-mail, the JWT issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// Key id, sent as the JWT `kid`
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// OAuth token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Where the key was loaded from
    #[serde(skip)]
    pub source: PathBuf,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    /// Read and parse a key file
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path).map_err(|e| AuthError::MalformedKey {
            path: path.to_path_buf(),
            reason: format!("cannot read key file: {}", e),
        })?;
        Self::from_json(&contents, path)
    }

    /// Parse key JSON; `path` is only used for error messages
    pub fn from_json(contents: &str, path: &Path) -> Result<Self, AuthError> {
        let malformed = |reason: String| AuthError::MalformedKey {
            path: path.to_path_buf(),
            reason,
        };

        let mut key: ServiceAccountKey =
            serde_json::from_str(contents).map_err(|e| malformed(e.to_string()))?;

        if let Some(kind) = key.key_type.as_deref()
            && kind != "service_account"
        {
            return Err(malformed(format!(
                "key type is '{}', expected 'service_account'",
                kind
            )));
        }
        if key.client_email.trim().is_empty() {
            return Err(malformed("client_email is empty".to_string()));
        }
        if !key.private_key.contains("PRIVATE KEY") {
            return Err(malformed("private_key is not a PEM private key".to_string()));
        }

        key.source = path.to_path_buf();
        Ok(key)
    }

    /// Sign an RS256 assertion for `scope`, valid from `now` for one hour
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
                AuthError::MalformedKey {
                    path: self.source.clone(),
                    reason: format!("unusable private_key: {}", e),
                }
            })?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = Claims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        jsonwebtoken::encode(&header, &claims, &encoding_key).map_err(|e| {
            AuthError::MalformedKey {
                path: self.source.clone(),
                reason: format!("failed to sign assertion: {}", e),
            }
        })
    }
}
