//! Input validation for a single publish invocation.

use crate::error::{PublishError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Location of the release notes, relative to the project directory
pub const RELEASE_NOTES_RELATIVE_PATH: &str = "distribution/whatsnew/en-US.txt";

/// Language tag the release notes are published under
pub const RELEASE_NOTES_LANGUAGE: &str = "en-US";

/// Google Play distribution track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Track {
    /// Internal testing
    #[default]
    Internal,
    /// Closed testing
    Alpha,
    /// Open testing
    Beta,
    /// Production
    Production,
}

impl Track {
    /// Every known track, in promotion order
    pub const ALL: [Track; 4] = [Track::Internal, Track::Alpha, Track::Beta, Track::Production];

    /// API name of the track
    pub fn as_str(self) -> &'static str {
        match self {
            Track::Internal => "internal",
            Track::Alpha => "alpha",
            Track::Beta => "beta",
            Track::Production => "production",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Track::ALL
            .into_iter()
            .find(|track| track.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Track::ALL.iter().map(|t| t.as_str()).collect();
                PublishError::config(format!(
                    "unknown track '{}'; expected one of: {}",
                    wanted,
                    known.join(" | ")
                ))
            })
    }
}

/// Reference to the service-account key used to obtain a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Path of the JSON key file
    pub path: PathBuf,
}

/// Raw, unvalidated inputs as gathered from flags and environment
#[derive(Debug, Clone, Default)]
pub struct PublishInputs {
    /// Bundle file (`.aab`)
    pub bundle_path: Option<PathBuf>,
    /// Application package identifier
    pub package_name: Option<String>,
    /// Service-account key file
    pub service_account_path: Option<PathBuf>,
    /// Target track name; `internal` when absent
    pub track: Option<String>,
    /// Project directory holding `distribution/whatsnew`; current dir when absent
    pub project_dir: Option<PathBuf>,
}

/// Validated, immutable description of one publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Application package identifier
    pub package_name: String,
    /// Bundle file to upload
    pub bundle_path: PathBuf,
    /// Target track
    pub track: Track,
    /// Credential for the token exchange
    pub credential: Credential,
    /// Conventional release-notes location; the file itself is optional
    pub release_notes_path: PathBuf,
}

impl PublishInputs {
    /// Validate every input without touching the network
    pub fn validate(&self) -> Result<PublishRequest> {
        let bundle_path = self.bundle_path.as_deref().ok_or_else(|| {
            PublishError::config("bundle path not provided; pass the .aab file as an argument")
        })?;
        check_readable_file(bundle_path, "bundle file")?;
        if bundle_path.extension().and_then(|e| e.to_str()) != Some("aab") {
            log::warn!(
                "{} does not have an .aab extension; uploading anyway",
                bundle_path.display()
            );
        }

        let package_name = match self.package_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Err(PublishError::config("PACKAGE_NAME environment variable not set")),
        };
        validate_package_name(package_name)?;

        let credential_path = self.service_account_path.as_deref().ok_or_else(|| {
            PublishError::config("PLAY_STORE_SERVICE_ACCOUNT_PATH environment variable not set")
        })?;
        if !credential_path.is_file() {
            return Err(PublishError::config(format!(
                "service account file not found: {}",
                credential_path.display()
            )));
        }

        let track = match self.track.as_deref() {
            Some(name) => name.parse()?,
            None => Track::default(),
        };

        let project_dir = match &self.project_dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(PublishError::config(format!(
                        "project directory not found: {}",
                        dir.display()
                    )));
                }
                dir.clone()
            }
            None => PathBuf::from("."),
        };

        Ok(PublishRequest {
            package_name: package_name.to_string(),
            bundle_path: bundle_path.to_path_buf(),
            track,
            credential: Credential {
                path: credential_path.to_path_buf(),
            },
            release_notes_path: project_dir.join(RELEASE_NOTES_RELATIVE_PATH),
        })
    }
}

fn check_readable_file(path: &Path, what: &str) -> Result<()> {
    let metadata = fs::metadata(path)
        .map_err(|_| PublishError::config(format!("{} not found: {}", what, path.display())))?;
    if !metadata.is_file() {
        return Err(PublishError::config(format!(
            "{} is not a regular file: {}",
            what,
            path.display()
        )));
    }
    fs::File::open(path).map_err(|e| {
        PublishError::config(format!("{} is not readable: {} ({})", what, path.display(), e))
    })?;
    Ok(())
}

/// Android application IDs: two or more dot-separated segments, each starting
/// with a letter and made of ASCII letters, digits and underscores.
fn validate_package_name(name: &str) -> Result<()> {
    let segments: Vec<&str> = name.split('.').collect();
    let well_formed = segments.len() >= 2
        && segments.iter().all(|segment| {
            segment.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if well_formed {
        Ok(())
    } else {
        Err(PublishError::config(format!(
            "invalid package name '{}': expected something like com.example.app",
            name
        )))
    }
}
