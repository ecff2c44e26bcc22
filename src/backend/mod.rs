//! The publishing backend seam.
//!
//! [`PlayBackend`] is the edit/commit contract the workflow drives. The
//! production implementation is [`AndroidPublisherClient`]; tests substitute an
//! in-memory stub.

mod http;
pub mod wire;

pub use http::AndroidPublisherClient;

use crate::bundle::BundleArtifact;
use crate::config::{Credential, Track};
use crate::error::{AuthError, BackendFailure};
use crate::notes::ReleaseNotes;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Release status for a full rollout
pub const RELEASE_STATUS_COMPLETED: &str = "completed";

/// Server-side transaction scoping changes until commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    /// Edit identifier
    pub id: String,
    /// When the backend discards the edit, if reported
    pub expires_at: Option<DateTime<Utc>>,
}

/// What the backend recorded for an uploaded bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBundle {
    /// Version code assigned to the bundle
    pub version_code: i64,
    /// Backend-computed SHA-256, if reported
    pub sha256: Option<String>,
}

/// A single release placed on a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRelease {
    /// Track the release is assigned to
    pub track: Track,
    /// Version code of the uploaded bundle
    pub version_code: i64,
    /// Release status; always `completed` (full rollout) here
    pub status: String,
}

impl TrackRelease {
    /// Full rollout of `version_code` on `track`
    pub fn completed(track: Track, version_code: i64) -> Self {
        Self {
            track,
            version_code,
            status: RELEASE_STATUS_COMPLETED.to_string(),
        }
    }
}

/// Options for committing an edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit without sending the changes for review
    pub changes_not_sent_for_review: bool,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEdit {
    /// Identifier of the committed edit
    pub id: String,
}

/// Package-publishing backend with an edit/commit transaction model
///
/// Calls take `&self` so the workflow can retry idempotent calls through plain
/// closures; implementations keep mutable state (tokens) behind locks.
#[async_trait]
pub trait PlayBackend: Send + Sync {
    /// Obtain a bearer token from the credential
    async fn authenticate(&self, credential: &Credential) -> Result<(), AuthError>;

    /// Open a new edit for `package`
    async fn open_edit(&self, package: &str) -> Result<EditSession, BackendFailure>;

    /// Upload the bundle into the edit
    async fn upload_bundle(
        &self,
        package: &str,
        edit: &EditSession,
        bundle: &BundleArtifact,
    ) -> Result<UploadedBundle, BackendFailure>;

    /// Replace the track's releases with `release`; returns what the backend stored
    async fn assign_track(
        &self,
        package: &str,
        edit: &EditSession,
        release: &TrackRelease,
    ) -> Result<TrackRelease, BackendFailure>;

    /// Attach notes to an already assigned release
    async fn attach_release_notes(
        &self,
        package: &str,
        edit: &EditSession,
        release: &TrackRelease,
        notes: &ReleaseNotes,
    ) -> Result<(), BackendFailure>;

    /// Commit the edit; the edit id is invalid afterwards
    async fn commit_edit(
        &self,
        package: &str,
        edit: &EditSession,
        options: &CommitOptions,
    ) -> Result<CommittedEdit, BackendFailure>;

    /// Delete the edit without committing it
    async fn abandon_edit(&self, package: &str, edit: &EditSession) -> Result<(), BackendFailure>;
}
