//! Error types for play_publisher operations.
//!
//! Every failure carries enough context (step, backend status, message) to be
//! diagnosed from the last line the process prints, plus recovery suggestions.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for play_publisher operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Main error type for all publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    /// Bad or missing local inputs; no network was contacted
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Human-readable reason
        reason: String,
    },

    /// The service-account credential was malformed or rejected
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    /// A call against the publishing backend failed
    #[error("Backend error during '{step}': {cause}")]
    Backend {
        /// Workflow step that failed
        step: PublishStep,
        /// What went wrong
        cause: BackendFailure,
    },

    /// Another publish for the same package holds the lock
    #[error("Publish lock for '{package}' unavailable: {reason}")]
    Lock {
        /// Package identifier the lock is keyed by
        package: String,
        /// Reason for the error
        reason: String,
    },

    /// IO errors outside input validation
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Workflow steps that talk to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishStep {
    /// Opening the edit session
    OpenEdit,
    /// Uploading the bundle payload
    UploadBundle,
    /// Assigning the release to a track
    AssignTrack,
    /// Attaching release notes
    ReleaseNotes,
    /// Committing the edit session
    Commit,
    /// Abandoning (deleting) the edit session
    Abandon,
}

impl PublishStep {
    /// Stable snake_case name used in logs and error output
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStep::OpenEdit => "open_edit",
            PublishStep::UploadBundle => "upload_bundle",
            PublishStep::AssignTrack => "assign_track",
            PublishStep::ReleaseNotes => "release_notes",
            PublishStep::Commit => "commit",
            PublishStep::Abandon => "abandon",
        }
    }

    /// Whether repeating this call against the same edit is safe
    pub fn is_idempotent(self) -> bool {
        !matches!(self, PublishStep::UploadBundle | PublishStep::Commit)
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cause of a failed backend call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// Backend answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// Request never produced a response
    #[error("transport failure: {reason}")]
    Transport {
        /// Reason for the error
        reason: String,
        /// Whether the failure looks temporary (connect, timeout)
        transient: bool,
    },

    /// Response arrived but could not be understood
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// Reason for the error
        reason: String,
    },

    /// Backend digest of the uploaded bundle differs from the local one
    #[error("bundle checksum mismatch: local sha256 {expected}, backend reported {actual}")]
    ChecksumMismatch {
        /// Locally computed SHA-256
        expected: String,
        /// SHA-256 reported by the backend
        actual: String,
    },
}

impl BackendFailure {
    /// Create a status failure
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid-response failure
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Retrying the same request may succeed (5xx, 429, connect, timeout)
    pub fn is_transient(&self) -> bool {
        match self {
            BackendFailure::Status { status, .. } => *status >= 500 || *status == 429,
            BackendFailure::Transport { transient, .. } => *transient,
            BackendFailure::InvalidResponse { .. } | BackendFailure::ChecksumMismatch { .. } => {
                false
            }
        }
    }

    /// HTTP status, if the backend answered
    pub fn http_status(&self) -> Option<u16> {
        match self {
            BackendFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendFailure {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return BackendFailure::status(status.as_u16(), error.to_string());
        }
        if error.is_decode() {
            return BackendFailure::invalid(error.to_string());
        }
        BackendFailure::Transport {
            transient: error.is_connect() || error.is_timeout(),
            reason: error.to_string(),
        }
    }
}

/// Authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Key file could not be read or parsed
    #[error("malformed service-account key {path}: {reason}")]
    MalformedKey {
        /// Path of the key file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Token endpoint refused the assertion
    #[error("token request rejected (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Message from the token endpoint
        message: String,
    },

    /// Token endpoint could not be reached or answered garbage
    #[error("token exchange failed: {reason}")]
    Exchange {
        /// Reason for the error
        reason: String,
        /// Whether the failure looks temporary
        transient: bool,
    },

    /// Backend call attempted before a token was obtained
    #[error("no access token; authenticate first")]
    NotAuthenticated,
}

impl AuthError {
    /// Retrying the exchange may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Rejected { status, .. } => *status >= 500 || *status == 429,
            AuthError::Exchange { transient, .. } => *transient,
            AuthError::MalformedKey { .. } | AuthError::NotAuthenticated => false,
        }
    }
}

impl PublishError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a backend error for a step
    pub fn backend(step: PublishStep, cause: BackendFailure) -> Self {
        Self::Backend { step, cause }
    }

    /// Step that failed, for backend errors
    pub fn step(&self) -> Option<PublishStep> {
        match self {
            PublishError::Backend { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::Backend { cause, .. } => cause.is_transient(),
            PublishError::Authentication(auth) => auth.is_transient(),
            PublishError::Configuration { .. } | PublishError::Lock { .. } | PublishError::Io(_) => {
                false
            }
        }
    }

    /// Whether rerunning the whole workflow from scratch is safe
    ///
    /// Failures at or after the upload may leave an orphaned edit and should go
    /// to a human instead of an automatic rerun.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PublishError::Backend { step, .. } => matches!(step, PublishStep::OpenEdit),
            _ => true,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PublishError::Configuration { .. } => vec![
                "Fix the input named above and rerun; nothing was sent to Google Play".to_string(),
                "Required: bundle path argument, PACKAGE_NAME, PLAY_STORE_SERVICE_ACCOUNT_PATH"
                    .to_string(),
            ],
            PublishError::Authentication(AuthError::MalformedKey { .. }) => vec![
                "Download a fresh JSON key for the service account from the Cloud console"
                    .to_string(),
            ],
            PublishError::Authentication(_) => vec![
                "Verify the service account is linked in Play Console > Users and permissions"
                    .to_string(),
                "Check that the key has not been revoked or expired".to_string(),
            ],
            PublishError::Backend {
                step: PublishStep::OpenEdit,
                cause,
            } => {
                let mut suggestions =
                    vec!["No edit was created; it is safe to rerun the publish".to_string()];
                if cause.http_status() == Some(404) {
                    suggestions.push(
                        "Check PACKAGE_NAME; the app must already exist in Play Console"
                            .to_string(),
                    );
                }
                suggestions
            }
            PublishError::Backend {
                step: PublishStep::UploadBundle,
                ..
            } => vec![
                "The open edit was not committed; nothing went live".to_string(),
                "A version code can only be uploaded once; bump it before retrying if the upload reached Play".to_string(),
            ],
            PublishError::Backend {
                step: PublishStep::Commit,
                ..
            } => vec![
                "The bundle was uploaded but the release may not be live".to_string(),
                "Check the track in Play Console before rerunning".to_string(),
            ],
            PublishError::Backend { .. } => vec![
                "The edit was not committed; review the backend message above".to_string(),
            ],
            PublishError::Lock { .. } => vec![
                "Wait for the other publish of this package to finish".to_string(),
                "Remove the lock file only if no publisher process is running".to_string(),
            ],
            PublishError::Io(_) => {
                vec!["Check the error message above for specific details".to_string()]
            }
        }
    }
}
