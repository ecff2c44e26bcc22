//! The release publishing workflow.
//!
//! `Idle → Validated → Authenticated → EditOpen → BundleUploaded →
//! TrackAssigned → [NotesAttached] → Committed`
//!
//! Any failure leaves the publisher in the last state it reached. The workflow
//! never rolls back on its own; the caller decides whether to [`Publisher::abandon`]
//! the open edit.

mod retry;

pub(crate) use retry::retry_with_backoff;

use crate::backend::{CommitOptions, EditSession, PlayBackend, TrackRelease};
use crate::bundle::BundleArtifact;
use crate::config::{PublishInputs, RetryConfig, Track};
use crate::error::{AuthError, BackendFailure, PublishError, PublishStep, Result};
use crate::lock::PackageLock;
use crate::notes::load_release_notes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where the workflow stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PublishState {
    /// Nothing done yet
    Idle,
    /// Inputs checked; no network contacted
    Validated,
    /// Bearer token obtained
    Authenticated,
    /// Edit session open on the backend
    EditOpen,
    /// Bundle uploaded into the edit
    BundleUploaded,
    /// Release placed on the track
    TrackAssigned,
    /// Release notes attached
    NotesAttached,
    /// Edit committed; terminal success
    Committed,
    /// Edit deleted without commit
    Abandoned,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Idle => "idle",
            PublishState::Validated => "validated",
            PublishState::Authenticated => "authenticated",
            PublishState::EditOpen => "edit open",
            PublishState::BundleUploaded => "bundle uploaded",
            PublishState::TrackAssigned => "track assigned",
            PublishState::NotesAttached => "notes attached",
            PublishState::Committed => "committed",
            PublishState::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Progress notifications, delivered in workflow order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    /// Inputs validated
    Validated {
        /// Package identifier
        package: String,
        /// Target track
        track: Track,
        /// Bundle file
        bundle: PathBuf,
    },
    /// Token obtained
    Authenticated,
    /// Edit opened
    EditOpened {
        /// Edit identifier
        edit_id: String,
    },
    /// Bundle uploaded
    BundleUploaded {
        /// Version code assigned by the backend
        version_code: i64,
        /// Uploaded size
        size_bytes: u64,
    },
    /// Release placed on the track
    TrackAssigned {
        /// Track
        track: Track,
        /// Version code of the release
        version_code: i64,
    },
    /// Notes attached
    NotesAttached {
        /// Language tag
        language: String,
    },
    /// No notes file; nothing sent
    NotesSkipped {
        /// Where notes were looked for
        path: PathBuf,
    },
    /// Notes upload failed; the workflow continues
    NotesFailed {
        /// What went wrong
        reason: String,
    },
    /// Edit committed
    Committed {
        /// Edit identifier
        edit_id: String,
    },
    /// A transient failure is about to be retried
    Retrying {
        /// Operation being retried
        operation: String,
        /// Retry number, from 1
        attempt: u32,
        /// Retry budget
        max_retries: u32,
        /// Delay before the retry
        wait: Duration,
        /// Failure that triggered it
        reason: String,
    },
    /// Open edit deleted
    Abandoned {
        /// Edit identifier
        edit_id: String,
    },
}

impl fmt::Display for PublishEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishEvent::Validated {
                package,
                track,
                bundle,
            } => write!(
                f,
                "Validated inputs: {} → {} track ({})",
                package,
                track,
                bundle.display()
            ),
            PublishEvent::Authenticated => write!(f, "Authenticated with Google Play"),
            PublishEvent::EditOpened { edit_id } => write!(f, "Opened edit {}", edit_id),
            PublishEvent::BundleUploaded {
                version_code,
                size_bytes,
            } => write!(
                f,
                "Uploaded bundle → version code {} ({} bytes)",
                version_code, size_bytes
            ),
            PublishEvent::TrackAssigned {
                track,
                version_code,
            } => write!(
                f,
                "Assigned track '{}' with version code {}",
                track, version_code
            ),
            PublishEvent::NotesAttached { language } => {
                write!(f, "Attached release notes ({})", language)
            }
            PublishEvent::NotesSkipped { path } => {
                write!(f, "No release notes at {}; skipped", path.display())
            }
            PublishEvent::NotesFailed { reason } => {
                write!(f, "Release notes not attached (continuing): {}", reason)
            }
            PublishEvent::Committed { edit_id } => write!(f, "Committed edit {}", edit_id),
            PublishEvent::Retrying {
                operation,
                attempt,
                max_retries,
                wait,
                reason,
            } => write!(
                f,
                "{} failed (retry {}/{}): {}; retrying in {:.1}s",
                operation,
                attempt,
                max_retries,
                reason,
                wait.as_secs_f64()
            ),
            PublishEvent::Abandoned { edit_id } => write!(f, "Abandoned edit {}", edit_id),
        }
    }
}

/// What happened to the release notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesOutcome {
    /// Notes attached under this language
    Attached(String),
    /// No notes file
    Skipped,
    /// Upload failed; release committed without notes
    Failed(String),
}

/// Summary of a committed publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Package identifier
    pub package: String,
    /// Track the release went to
    pub track: Track,
    /// Committed edit
    pub edit_id: String,
    /// Version code of the uploaded bundle
    pub version_code: i64,
    /// Release notes outcome
    pub notes: NotesOutcome,
    /// Local time of the commit
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LockSettings {
    dir: PathBuf,
    timeout: Duration,
}

#[derive(Debug, Clone)]
struct OpenEdit {
    package: String,
    session: EditSession,
}

/// Drives one publish through a [`PlayBackend`]
pub struct Publisher<B> {
    backend: B,
    retry: RetryConfig,
    commit_options: CommitOptions,
    lock_settings: Option<LockSettings>,
    lock: Option<PackageLock>,
    state: PublishState,
    open_edit: Option<OpenEdit>,
}

impl<B: PlayBackend> Publisher<B> {
    /// Publisher with default retries, no lock and default commit options
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
            commit_options: CommitOptions::default(),
            lock_settings: None,
            lock: None,
            state: PublishState::Idle,
            open_edit: None,
        }
    }

    /// Use these retry limits
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Use these commit options
    pub fn with_commit_options(mut self, options: CommitOptions) -> Self {
        self.commit_options = options;
        self
    }

    /// Hold a per-package lock in `dir` while publishing
    pub fn with_lock(mut self, dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        self.lock_settings = Some(LockSettings {
            dir: dir.into(),
            timeout,
        });
        self
    }

    /// Current workflow state
    pub fn state(&self) -> PublishState {
        self.state
    }

    /// Identifier of the edit left open by a failure, if any
    pub fn open_edit_id(&self) -> Option<&str> {
        self.open_edit.as_ref().map(|edit| edit.session.id.as_str())
    }

    /// The backend, for inspection
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the whole workflow once
    ///
    /// `on_event` receives a [`PublishEvent`] for every completed step.
    pub async fn publish<F>(&mut self, inputs: &PublishInputs, mut on_event: F) -> Result<PublishReport>
    where
        F: FnMut(&PublishEvent),
    {
        if self.state != PublishState::Idle {
            return Err(PublishError::config(format!(
                "publisher already used (state: {}); create a new one per publish",
                self.state
            )));
        }

        // Validated: everything local, before any network call
        let request = inputs.validate()?;
        self.state = PublishState::Validated;
        on_event(&PublishEvent::Validated {
            package: request.package_name.clone(),
            track: request.track,
            bundle: request.bundle_path.clone(),
        });

        if let Some(settings) = &self.lock_settings {
            let lock =
                PackageLock::acquire(&settings.dir, &request.package_name, settings.timeout).await?;
            self.lock = Some(lock);
        }

        let artifact = BundleArtifact::inspect(&request.bundle_path).await?;
        log::debug!(
            "Bundle {}: {} bytes, sha256 {}",
            artifact.path.display(),
            artifact.size_bytes,
            artifact.sha256
        );

        let backend = &self.backend;
        let retry = &self.retry;
        let package = request.package_name.as_str();

        // Authenticated
        let credential = &request.credential;
        retry_with_backoff(
            move || backend.authenticate(credential),
            retry.authenticate,
            retry,
            AuthError::is_transient,
            |attempt, wait, error| {
                on_event(&retrying("authenticate", attempt, retry.authenticate, wait, error))
            },
        )
        .await?;
        self.state = PublishState::Authenticated;
        on_event(&PublishEvent::Authenticated);

        // EditOpen
        let open_retries = retry.retries_for(PublishStep::OpenEdit);
        let edit = retry_with_backoff(
            move || backend.open_edit(package),
            open_retries,
            retry,
            BackendFailure::is_transient,
            |attempt, wait, error| {
                on_event(&retrying("open_edit", attempt, open_retries, wait, error))
            },
        )
        .await
        .map_err(|cause| PublishError::backend(PublishStep::OpenEdit, cause))?;
        self.state = PublishState::EditOpen;
        self.open_edit = Some(OpenEdit {
            package: package.to_string(),
            session: edit.clone(),
        });
        log::info!("Opened edit {} (expires {:?})", edit.id, edit.expires_at);
        on_event(&PublishEvent::EditOpened {
            edit_id: edit.id.clone(),
        });

        // BundleUploaded: never retried
        let uploaded = backend
            .upload_bundle(package, &edit, &artifact)
            .await
            .map_err(|cause| PublishError::backend(PublishStep::UploadBundle, cause))?;
        match uploaded.sha256.as_deref() {
            Some(reported) if !artifact.matches_sha256(reported) => {
                return Err(PublishError::backend(
                    PublishStep::UploadBundle,
                    BackendFailure::ChecksumMismatch {
                        expected: artifact.sha256.clone(),
                        actual: reported.to_string(),
                    },
                ));
            }
            Some(_) => log::debug!("Backend checksum matches local bundle"),
            None => log::debug!("Backend did not report a checksum"),
        }
        let version_code = uploaded.version_code;
        self.state = PublishState::BundleUploaded;
        on_event(&PublishEvent::BundleUploaded {
            version_code,
            size_bytes: artifact.size_bytes,
        });

        // TrackAssigned
        let release = TrackRelease::completed(request.track, version_code);
        let track_retries = retry.retries_for(PublishStep::AssignTrack);
        let stored = {
            let (edit, release) = (&edit, &release);
            retry_with_backoff(
                move || backend.assign_track(package, edit, release),
                track_retries,
                retry,
                BackendFailure::is_transient,
                |attempt, wait, error| {
                    on_event(&retrying("assign_track", attempt, track_retries, wait, error))
                },
            )
            .await
            .map_err(|cause| PublishError::backend(PublishStep::AssignTrack, cause))?
        };
        if stored.track != release.track || stored.version_code != release.version_code {
            return Err(PublishError::backend(
                PublishStep::AssignTrack,
                BackendFailure::invalid(format!(
                    "backend stored version {} on '{}', requested {} on '{}'",
                    stored.version_code, stored.track, release.version_code, release.track
                )),
            ));
        }
        self.state = PublishState::TrackAssigned;
        on_event(&PublishEvent::TrackAssigned {
            track: stored.track,
            version_code: stored.version_code,
        });

        // NotesAttached: optional, and a failure here does not stop the commit
        let notes_outcome = match load_release_notes(&request.release_notes_path).await {
            Ok(None) => {
                on_event(&PublishEvent::NotesSkipped {
                    path: request.release_notes_path.clone(),
                });
                NotesOutcome::Skipped
            }
            Ok(Some(notes)) => {
                let notes_retries = retry.retries_for(PublishStep::ReleaseNotes);
                let attached = {
                    let (edit, release, notes) = (&edit, &release, &notes);
                    retry_with_backoff(
                        move || backend.attach_release_notes(package, edit, release, notes),
                        notes_retries,
                        retry,
                        BackendFailure::is_transient,
                        |attempt, wait, error| {
                            on_event(&retrying(
                                "release_notes",
                                attempt,
                                notes_retries,
                                wait,
                                error,
                            ))
                        },
                    )
                    .await
                };
                match attached {
                    Ok(()) => {
                        self.state = PublishState::NotesAttached;
                        on_event(&PublishEvent::NotesAttached {
                            language: notes.language.clone(),
                        });
                        NotesOutcome::Attached(notes.language)
                    }
                    Err(cause) => {
                        let error = PublishError::backend(PublishStep::ReleaseNotes, cause);
                        log::warn!("{}", error);
                        let reason = error.to_string();
                        on_event(&PublishEvent::NotesFailed {
                            reason: reason.clone(),
                        });
                        NotesOutcome::Failed(reason)
                    }
                }
            }
            Err(error) => {
                log::warn!(
                    "Cannot read release notes {}: {}",
                    request.release_notes_path.display(),
                    error
                );
                let reason = error.to_string();
                on_event(&PublishEvent::NotesFailed {
                    reason: reason.clone(),
                });
                NotesOutcome::Failed(reason)
            }
        };

        // Committed: never retried
        if let Some(expires_at) = edit.expires_at
            && expires_at <= Utc::now()
        {
            log::warn!("Edit {} expired at {}; commit will likely fail", edit.id, expires_at);
        }
        let committed = backend
            .commit_edit(package, &edit, &self.commit_options)
            .await
            .map_err(|cause| PublishError::backend(PublishStep::Commit, cause))?;
        self.state = PublishState::Committed;
        self.open_edit = None;
        self.lock = None;
        on_event(&PublishEvent::Committed {
            edit_id: committed.id.clone(),
        });

        Ok(PublishReport {
            package: request.package_name.clone(),
            track: stored.track,
            edit_id: committed.id,
            version_code,
            notes: notes_outcome,
            committed_at: Utc::now(),
        })
    }

    /// Delete the edit a failed publish left open
    ///
    /// Returns `Ok(false)` when there is nothing to abandon. On failure the edit
    /// stays recorded so the call can be repeated.
    pub async fn abandon<F>(&mut self, mut on_event: F) -> Result<bool>
    where
        F: FnMut(&PublishEvent),
    {
        let Some(open) = self.open_edit.clone() else {
            return Ok(false);
        };

        let backend = &self.backend;
        let retries = self.retry.retries_for(PublishStep::Abandon);
        let (package, session) = (open.package.as_str(), &open.session);
        retry_with_backoff(
            move || backend.abandon_edit(package, session),
            retries,
            &self.retry,
            BackendFailure::is_transient,
            |attempt, wait, error| on_event(&retrying("abandon", attempt, retries, wait, error)),
        )
        .await
        .map_err(|cause| PublishError::backend(PublishStep::Abandon, cause))?;

        self.open_edit = None;
        self.lock = None;
        self.state = PublishState::Abandoned;
        on_event(&PublishEvent::Abandoned {
            edit_id: open.session.id,
        });
        Ok(true)
    }
}

fn retrying(
    operation: &str,
    attempt: u32,
    max_retries: u32,
    wait: Duration,
    error: &dyn fmt::Display,
) -> PublishEvent {
    log::warn!(
        "{} failed (retry {}/{}): {}",
        operation,
        attempt,
        max_retries,
        error
    );
    PublishEvent::Retrying {
        operation: operation.to_string(),
        attempt,
        max_retries,
        wait,
        reason: error.to_string(),
    }
}
