//! Android Publisher v3 over HTTPS

use super::wire::{self, AppEdit, Bundle, LocalizedText, ReleaseBody, TrackBody};
use super::{
    CommitOptions, CommittedEdit, EditSession, PlayBackend, TrackRelease, UploadedBundle,
};
use crate::auth::TokenCache;
use crate::bundle::BundleArtifact;
use crate::config::{Credential, Settings, Track};
use crate::error::{AuthError, BackendFailure, PublishError, Result};
use crate::notes::ReleaseNotes;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use url::Url;

/// HTTP client for the publishing API
pub struct AndroidPublisherClient {
    http: Client,
    api_base: Url,
    request_timeout: Duration,
    upload_timeout: Duration,
    tokens: TokenCache,
}

impl std::fmt::Debug for AndroidPublisherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AndroidPublisherClient")
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl AndroidPublisherClient {
    /// Create a client from settings; no request is made
    pub fn new(settings: &Settings) -> Result<Self> {
        let api_base = Url::parse(&settings.api_base_url).map_err(|e| {
            PublishError::config(format!("invalid api_base_url '{}': {}", settings.api_base_url, e))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(PublishError::config(format!(
                "api_base_url '{}' cannot be used as a base URL",
                settings.api_base_url
            )));
        }

        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(settings.request_timeout().max(settings.upload_timeout()))
            .build()
            .map_err(|e| PublishError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base,
            request_timeout: settings.request_timeout(),
            upload_timeout: settings.upload_timeout(),
            tokens: TokenCache::new(settings.request_timeout()),
        })
    }

    /// `{base}[/upload]/androidpublisher/v3/applications/{segments...}`
    fn api_url(&self, upload: bool, segments: &[&str]) -> std::result::Result<Url, BackendFailure> {
        let mut url = self.api_base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendFailure::invalid("api base URL cannot carry a path"))?;
            path.pop_if_empty();
            if upload {
                path.push("upload");
            }
            path.extend(["androidpublisher", "v3", "applications"]);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn authorized(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<RequestBuilder, BackendFailure> {
        let token = self
            .tokens
            .bearer(&self.http)
            .await
            .map_err(token_failure)?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<String, BackendFailure> {
        let response = self.authorized(request).await?.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendFailure::status(status.as_u16(), wire::error_message(&body)));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, BackendFailure> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            BackendFailure::invalid(format!("{} in body: {}", e, wire::error_message(&body)))
        })
    }

    async fn put_track(
        &self,
        package: &str,
        edit: &EditSession,
        track: Track,
        release: ReleaseBody,
    ) -> std::result::Result<TrackBody, BackendFailure> {
        let url = self.api_url(
            false,
            &[package, "edits", &edit.id, "tracks", track.as_str()],
        )?;
        let body = TrackBody {
            track: track.as_str().to_string(),
            releases: vec![release],
        };
        log::debug!("PUT {}", url);
        self.send_json(
            self.http
                .put(url)
                .json(&body)
                .timeout(self.request_timeout),
        )
        .await
    }
}

fn token_failure(error: AuthError) -> BackendFailure {
    match error {
        AuthError::Rejected { status, message } => {
            BackendFailure::status(status, format!("token refresh rejected: {}", message))
        }
        other => BackendFailure::Transport {
            transient: other.is_transient(),
            reason: other.to_string(),
        },
    }
}

fn parse_expiry(edit: &AppEdit) -> Option<DateTime<Utc>> {
    edit.expiry_time_seconds
        .as_deref()
        .and_then(|secs| secs.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Read back the release the backend stored for `version_code`
fn confirmed_release(
    body: &TrackBody,
    requested: &TrackRelease,
) -> std::result::Result<TrackRelease, BackendFailure> {
    let track: Track = body.track.parse().map_err(|_| {
        BackendFailure::invalid(format!("backend answered with unknown track '{}'", body.track))
    })?;
    let wanted = requested.version_code.to_string();
    let release = body
        .releases
        .iter()
        .find(|release| release.version_codes.contains(&wanted))
        .ok_or_else(|| {
            BackendFailure::invalid(format!(
                "track '{}' does not list version code {}",
                body.track, wanted
            ))
        })?;

    Ok(TrackRelease {
        track,
        version_code: requested.version_code,
        status: release.status.clone(),
    })
}

#[async_trait]
impl PlayBackend for AndroidPublisherClient {
    async fn authenticate(&self, credential: &Credential) -> std::result::Result<(), AuthError> {
        let expires_at = self.tokens.authenticate(&self.http, credential).await?;
        log::debug!("Access token valid until {}", expires_at);
        Ok(())
    }

    async fn open_edit(&self, package: &str) -> std::result::Result<EditSession, BackendFailure> {
        let url = self.api_url(false, &[package, "edits"])?;
        log::debug!("POST {}", url);
        let edit: AppEdit = self
            .send_json(
                self.http
                    .post(url)
                    .json(&serde_json::json!({}))
                    .timeout(self.request_timeout),
            )
            .await?;

        if edit.id.is_empty() {
            return Err(BackendFailure::invalid("backend returned an empty edit id"));
        }
        Ok(EditSession {
            expires_at: parse_expiry(&edit),
            id: edit.id,
        })
    }

    async fn upload_bundle(
        &self,
        package: &str,
        edit: &EditSession,
        bundle: &BundleArtifact,
    ) -> std::result::Result<UploadedBundle, BackendFailure> {
        let mut url = self.api_url(true, &[package, "edits", &edit.id, "bundles"])?;
        url.query_pairs_mut().append_pair("uploadType", "media");

        let file = tokio::fs::File::open(&bundle.path)
            .await
            .map_err(|e| BackendFailure::Transport {
                reason: format!("cannot open {}: {}", bundle.path.display(), e),
                transient: false,
            })?;

        log::debug!("POST {} ({} bytes)", url, bundle.size_bytes);
        let uploaded: Bundle = self
            .send_json(
                self.http
                    .post(url)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .header(CONTENT_LENGTH, bundle.size_bytes)
                    .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
                    .timeout(self.upload_timeout),
            )
            .await?;

        let version_code = uploaded
            .version_code
            .ok_or_else(|| BackendFailure::invalid("upload response has no versionCode"))?;
        Ok(UploadedBundle {
            version_code,
            sha256: uploaded.sha256,
        })
    }

    async fn assign_track(
        &self,
        package: &str,
        edit: &EditSession,
        release: &TrackRelease,
    ) -> std::result::Result<TrackRelease, BackendFailure> {
        let body = ReleaseBody {
            version_codes: vec![release.version_code.to_string()],
            status: release.status.clone(),
            release_notes: Vec::new(),
        };
        let stored = self.put_track(package, edit, release.track, body).await?;
        confirmed_release(&stored, release)
    }

    async fn attach_release_notes(
        &self,
        package: &str,
        edit: &EditSession,
        release: &TrackRelease,
        notes: &ReleaseNotes,
    ) -> std::result::Result<(), BackendFailure> {
        let body = ReleaseBody {
            version_codes: vec![release.version_code.to_string()],
            status: release.status.clone(),
            release_notes: vec![LocalizedText {
                language: notes.language.clone(),
                text: notes.text.clone(),
            }],
        };
        let stored = self.put_track(package, edit, release.track, body).await?;
        confirmed_release(&stored, release).map(|_| ())
    }

    async fn commit_edit(
        &self,
        package: &str,
        edit: &EditSession,
        options: &CommitOptions,
    ) -> std::result::Result<CommittedEdit, BackendFailure> {
        let commit_segment = format!("{}:commit", edit.id);
        let mut url = self.api_url(false, &[package, "edits", &commit_segment])?;
        if options.changes_not_sent_for_review {
            url.query_pairs_mut()
                .append_pair("changesNotSentForReview", "true");
        }

        log::debug!("POST {}", url);
        let committed: AppEdit = self
            .send_json(self.http.post(url).timeout(self.request_timeout))
            .await?;
        Ok(CommittedEdit { id: committed.id })
    }

    async fn abandon_edit(
        &self,
        package: &str,
        edit: &EditSession,
    ) -> std::result::Result<(), BackendFailure> {
        let url = self.api_url(false, &[package, "edits", &edit.id])?;
        log::debug!("DELETE {}", url);
        self.send(self.http.delete(url).timeout(self.request_timeout))
            .await
            .map(|_| ())
    }
}
