#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use play_publisher::backend::{
        CommitOptions, CommittedEdit, EditSession, PlayBackend, TrackRelease, UploadedBundle,
    };
    use play_publisher::bundle::BundleArtifact;
    use play_publisher::config::{Credential, PublishInputs, RetryConfig, Track};
    use play_publisher::error::{AuthError, BackendFailure, PublishError, PublishStep};
    use play_publisher::lock::PackageLock;
    use play_publisher::notes::ReleaseNotes;
    use play_publisher::publisher::{NotesOutcome, PublishEvent, PublishState, Publisher};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const PACKAGE: &str = "com.example.app";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Authenticate,
        OpenEdit,
        UploadBundle(u64),
        AssignTrack(Track, i64),
        AttachNotes(String),
        Commit(String, bool),
        Abandon(String),
    }

    /// In-memory backend recording every call
    struct StubBackend {
        edit_id: String,
        version_code: i64,
        reported_sha256: Option<String>,
        fail_auth: Option<AuthError>,
        fail_upload: Option<BackendFailure>,
        fail_notes: Option<BackendFailure>,
        fail_commit: Option<BackendFailure>,
        transient_track_failures: AtomicU32,
        calls: Mutex<Vec<Call>>,
    }

    impl StubBackend {
        fn new(edit_id: &str, version_code: i64) -> Self {
            Self {
                edit_id: edit_id.to_string(),
                version_code,
                reported_sha256: None,
                fail_auth: None,
                fail_upload: None,
                fail_notes: None,
                fail_commit: None,
                transient_track_failures: AtomicU32::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|call| predicate(call)).count()
        }
    }

    #[async_trait]
    impl PlayBackend for StubBackend {
        async fn authenticate(&self, _credential: &Credential) -> Result<(), AuthError> {
            self.record(Call::Authenticate);
            match &self.fail_auth {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }

        async fn open_edit(&self, package: &str) -> Result<EditSession, BackendFailure> {
            assert_eq!(package, PACKAGE);
            self.record(Call::OpenEdit);
            Ok(EditSession {
                id: self.edit_id.clone(),
                expires_at: None,
            })
        }

        async fn upload_bundle(
            &self,
            _package: &str,
            edit: &EditSession,
            bundle: &BundleArtifact,
        ) -> Result<UploadedBundle, BackendFailure> {
            assert_eq!(edit.id, self.edit_id);
            self.record(Call::UploadBundle(bundle.size_bytes));
            if let Some(error) = &self.fail_upload {
                return Err(error.clone());
            }
            Ok(UploadedBundle {
                version_code: self.version_code,
                sha256: self.reported_sha256.clone(),
            })
        }

        async fn assign_track(
            &self,
            _package: &str,
            _edit: &EditSession,
            release: &TrackRelease,
        ) -> Result<TrackRelease, BackendFailure> {
            self.record(Call::AssignTrack(release.track, release.version_code));
            let remaining = self.transient_track_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_track_failures
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(BackendFailure::status(503, "backend unavailable"));
            }
            Ok(release.clone())
        }

        async fn attach_release_notes(
            &self,
            _package: &str,
            _edit: &EditSession,
            _release: &TrackRelease,
            notes: &ReleaseNotes,
        ) -> Result<(), BackendFailure> {
            self.record(Call::AttachNotes(notes.text.clone()));
            match &self.fail_notes {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }

        async fn commit_edit(
            &self,
            _package: &str,
            edit: &EditSession,
            options: &CommitOptions,
        ) -> Result<CommittedEdit, BackendFailure> {
            self.record(Call::Commit(
                edit.id.clone(),
                options.changes_not_sent_for_review,
            ));
            if let Some(error) = &self.fail_commit {
                return Err(error.clone());
            }
            Ok(CommittedEdit {
                id: edit.id.clone(),
            })
        }

        async fn abandon_edit(
            &self,
            _package: &str,
            edit: &EditSession,
        ) -> Result<(), BackendFailure> {
            self.record(Call::Abandon(edit.id.clone()));
            Ok(())
        }
    }

    /// Bundle, key and project directory on disk
    struct Fixture {
        dir: TempDir,
        bundle: PathBuf,
        key: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let bundle = dir.path().join("app-release.aab");
            let key = dir.path().join("service-account.json");
            fs::write(&bundle, b"PK\x03\x04 bundle contents").unwrap();
            fs::write(&key, b"{}").unwrap();
            Self { dir, bundle, key }
        }

        fn inputs(&self) -> PublishInputs {
            PublishInputs {
                bundle_path: Some(self.bundle.clone()),
                package_name: Some(PACKAGE.to_string()),
                service_account_path: Some(self.key.clone()),
                track: None,
                project_dir: Some(self.dir.path().to_path_buf()),
            }
        }

        fn notes_path(&self) -> PathBuf {
            self.dir.path().join("distribution/whatsnew/en-US.txt")
        }

        fn write_notes(&self, text: &str) {
            let path = self.notes_path();
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }

        fn bundle_size(&self) -> u64 {
            fs::metadata(&self.bundle).unwrap().len()
        }
    }

    fn instant_retries() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 0,
            max_delay_ms: 0,
            ..RetryConfig::default()
        }
    }

    fn publisher(backend: StubBackend) -> Publisher<StubBackend> {
        Publisher::new(backend).with_retry(instant_retries())
    }

    #[tokio::test]
    async fn test_publish_without_notes_emits_events_in_order() {
        let fixture = Fixture::new();
        let mut publisher = publisher(StubBackend::new("edit-1", 42));
        let mut events = Vec::new();

        let report = publisher
            .publish(&fixture.inputs(), |event| events.push(event.clone()))
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                PublishEvent::Validated {
                    package: PACKAGE.to_string(),
                    track: Track::Internal,
                    bundle: fixture.bundle.clone(),
                },
                PublishEvent::Authenticated,
                PublishEvent::EditOpened {
                    edit_id: "edit-1".to_string(),
                },
                PublishEvent::BundleUploaded {
                    version_code: 42,
                    size_bytes: fixture.bundle_size(),
                },
                PublishEvent::TrackAssigned {
                    track: Track::Internal,
                    version_code: 42,
                },
                PublishEvent::NotesSkipped {
                    path: fixture.notes_path(),
                },
                PublishEvent::Committed {
                    edit_id: "edit-1".to_string(),
                },
            ]
        );

        assert_eq!(report.package, PACKAGE);
        assert_eq!(report.edit_id, "edit-1");
        assert_eq!(report.version_code, 42);
        assert_eq!(report.track, Track::Internal);
        assert_eq!(report.notes, NotesOutcome::Skipped);
        assert_eq!(publisher.state(), PublishState::Committed);
        assert_eq!(publisher.open_edit_id(), None);

        assert_eq!(
            publisher.backend().calls(),
            vec![
                Call::Authenticate,
                Call::OpenEdit,
                Call::UploadBundle(fixture.bundle_size()),
                Call::AssignTrack(Track::Internal, 42),
                Call::Commit("edit-1".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_notes_are_attached_before_commit() {
        let fixture = Fixture::new();
        fixture.write_notes("Bug fixes and performance improvements\n\n");
        let mut inputs = fixture.inputs();
        inputs.track = Some("beta".to_string());
        let mut publisher = publisher(StubBackend::new("edit-2", 7));

        let report = publisher.publish(&inputs, |_| {}).await.unwrap();

        assert_eq!(report.notes, NotesOutcome::Attached("en-US".to_string()));
        assert_eq!(report.track, Track::Beta);
        assert_eq!(
            publisher.backend().calls()[3..],
            [
                Call::AssignTrack(Track::Beta, 7),
                Call::AttachNotes("Bug fixes and performance improvements".to_string()),
                Call::Commit("edit-2".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_inputs_make_no_backend_calls() {
        let fixture = Fixture::new();
        let mut inputs = fixture.inputs();
        inputs.package_name = None;
        let mut publisher = publisher(StubBackend::new("edit-1", 1));
        let mut events = Vec::new();

        let error = publisher
            .publish(&inputs, |event| events.push(event.clone()))
            .await
            .unwrap_err();

        assert!(matches!(error, PublishError::Configuration { .. }));
        assert!(error.to_string().contains("PACKAGE_NAME"));
        assert!(events.is_empty());
        assert!(publisher.backend().calls().is_empty());
        assert_eq!(publisher.state(), PublishState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_track_makes_no_backend_calls() {
        let fixture = Fixture::new();
        let mut inputs = fixture.inputs();
        inputs.track = Some("staging".to_string());
        let mut publisher = publisher(StubBackend::new("edit-1", 1));

        let error = publisher.publish(&inputs, |_| {}).await.unwrap_err();

        assert!(matches!(error, PublishError::Configuration { .. }));
        assert!(publisher.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_authentication_failure_stops_before_edit() {
        let fixture = Fixture::new();
        let mut backend = StubBackend::new("edit-1", 1);
        backend.fail_auth = Some(AuthError::Rejected {
            status: 400,
            message: "invalid_grant".to_string(),
        });
        let mut publisher = publisher(backend);

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        assert!(matches!(error, PublishError::Authentication(_)));
        assert_eq!(publisher.backend().calls(), vec![Call::Authenticate]);
        assert_eq!(publisher.state(), PublishState::Validated);
        assert_eq!(publisher.open_edit_id(), None);
    }

    #[tokio::test]
    async fn test_upload_failure_skips_track_and_commit() {
        let fixture = Fixture::new();
        let mut backend = StubBackend::new("edit-3", 1);
        backend.fail_upload = Some(BackendFailure::status(
            403,
            "APK specifies a version code that has already been used",
        ));
        let mut publisher = publisher(backend);

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        assert_eq!(error.step(), Some(PublishStep::UploadBundle));
        assert!(error.to_string().contains("already been used"));
        assert_eq!(publisher.state(), PublishState::EditOpen);
        assert_eq!(publisher.open_edit_id(), Some("edit-3"));
        assert_eq!(
            publisher.backend().count(|c| matches!(
                c,
                Call::AssignTrack(..) | Call::Commit(..)
            )),
            0
        );
    }

    #[tokio::test]
    async fn test_upload_is_never_retried() {
        let fixture = Fixture::new();
        let mut backend = StubBackend::new("edit-4", 1);
        backend.fail_upload = Some(BackendFailure::status(503, "backend unavailable"));
        let mut publisher = publisher(backend);

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        assert!(error.is_transient());
        assert_eq!(
            publisher
                .backend()
                .count(|c| matches!(c, Call::UploadBundle(_))),
            1
        );
    }

    #[tokio::test]
    async fn test_checksum_mismatch_fails_upload_step() {
        let fixture = Fixture::new();
        let mut backend = StubBackend::new("edit-5", 1);
        backend.reported_sha256 = Some("00".repeat(32));
        let mut publisher = publisher(backend);

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        assert!(matches!(
            error,
            PublishError::Backend {
                step: PublishStep::UploadBundle,
                cause: BackendFailure::ChecksumMismatch { .. },
            }
        ));
        assert_eq!(
            publisher
                .backend()
                .count(|c| matches!(c, Call::AssignTrack(..))),
            0
        );
    }

    #[tokio::test]
    async fn test_matching_checksum_is_accepted() {
        let fixture = Fixture::new();
        let artifact = BundleArtifact::inspect(&fixture.bundle).await.unwrap();
        let mut backend = StubBackend::new("edit-6", 9);
        backend.reported_sha256 = Some(artifact.sha256.to_uppercase());
        let mut publisher = publisher(backend);

        let report = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap();
        assert_eq!(report.version_code, 9);
    }

    #[tokio::test]
    async fn test_transient_track_failures_are_retried() {
        let fixture = Fixture::new();
        let backend = StubBackend::new("edit-7", 5);
        backend.transient_track_failures.store(2, Ordering::SeqCst);
        let mut publisher = publisher(backend);
        let mut retries = Vec::new();

        let report = publisher
            .publish(&fixture.inputs(), |event| {
                if let PublishEvent::Retrying {
                    operation, attempt, ..
                } = event
                {
                    retries.push((operation.clone(), *attempt));
                }
            })
            .await
            .unwrap();

        assert_eq!(report.version_code, 5);
        assert_eq!(
            retries,
            vec![
                ("assign_track".to_string(), 1),
                ("assign_track".to_string(), 2)
            ]
        );
        assert_eq!(
            publisher
                .backend()
                .count(|c| matches!(c, Call::AssignTrack(..))),
            3
        );
    }

    #[tokio::test]
    async fn test_track_retries_exhausted_leaves_edit_open() {
        let fixture = Fixture::new();
        let backend = StubBackend::new("edit-8", 5);
        backend.transient_track_failures.store(10, Ordering::SeqCst);
        let mut publisher = Publisher::new(backend).with_retry(RetryConfig {
            assign_track: 1,
            ..RetryConfig::none()
        });

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        assert_eq!(error.step(), Some(PublishStep::AssignTrack));
        assert_eq!(publisher.state(), PublishState::BundleUploaded);
        assert_eq!(
            publisher
                .backend()
                .count(|c| matches!(c, Call::AssignTrack(..))),
            2
        );
        assert_eq!(publisher.backend().count(|c| matches!(c, Call::Commit(..))), 0);
    }

    #[tokio::test]
    async fn test_notes_failure_still_commits() {
        let fixture = Fixture::new();
        fixture.write_notes("What's new");
        let mut backend = StubBackend::new("edit-9", 3);
        backend.fail_notes = Some(BackendFailure::status(400, "Invalid language"));
        let mut publisher = publisher(backend);
        let mut events = Vec::new();

        let report = publisher
            .publish(&fixture.inputs(), |event| events.push(event.clone()))
            .await
            .unwrap();

        assert!(matches!(report.notes, NotesOutcome::Failed(ref reason) if reason.contains("Invalid language")));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PublishEvent::NotesFailed { .. }))
        );
        assert_eq!(publisher.state(), PublishState::Committed);
        assert_eq!(
            publisher.backend().calls().last(),
            Some(&Call::Commit("edit-9".to_string(), false))
        );
    }

    #[tokio::test]
    async fn test_unreadable_notes_still_commit() {
        let fixture = Fixture::new();
        let path = fixture.notes_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();
        let mut publisher = publisher(StubBackend::new("edit-10", 4));
        let mut events = Vec::new();

        let report = publisher
            .publish(&fixture.inputs(), |event| events.push(event.clone()))
            .await
            .unwrap();

        assert!(matches!(report.notes, NotesOutcome::Failed(_)));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PublishEvent::NotesFailed { .. }))
        );
        assert_eq!(
            publisher
                .backend()
                .count(|c| matches!(c, Call::AttachNotes(..))),
            0
        );
        assert_eq!(publisher.state(), PublishState::Committed);
        assert_eq!(
            publisher.backend().calls().last(),
            Some(&Call::Commit("edit-10".to_string(), false))
        );
    }

    #[tokio::test]
    async fn test_commit_options_reach_backend() {
        let fixture = Fixture::new();
        let mut publisher = publisher(StubBackend::new("edit-10", 3)).with_commit_options(
            CommitOptions {
                changes_not_sent_for_review: true,
            },
        );

        publisher.publish(&fixture.inputs(), |_| {}).await.unwrap();

        assert_eq!(
            publisher.backend().calls().last(),
            Some(&Call::Commit("edit-10".to_string(), true))
        );
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_edit_for_abandon() {
        let fixture = Fixture::new();
        let mut backend = StubBackend::new("edit-11", 3);
        backend.fail_commit = Some(BackendFailure::status(409, "edit conflict"));
        let mut publisher = publisher(backend);

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();
        assert_eq!(error.step(), Some(PublishStep::Commit));
        assert!(!error.is_recoverable());
        assert_eq!(publisher.open_edit_id(), Some("edit-11"));
        assert_eq!(publisher.backend().count(|c| matches!(c, Call::Commit(..))), 1);
    }

    #[tokio::test]
    async fn test_abandon_after_failure() {
        let fixture = Fixture::new();
        let mut backend = StubBackend::new("edit-12", 1);
        backend.fail_upload = Some(BackendFailure::status(400, "bad bundle"));
        let mut publisher = publisher(backend);
        publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        let mut events = Vec::new();
        let abandoned = publisher
            .abandon(|event| events.push(event.clone()))
            .await
            .unwrap();

        assert!(abandoned);
        assert_eq!(
            events,
            vec![PublishEvent::Abandoned {
                edit_id: "edit-12".to_string()
            }]
        );
        assert_eq!(publisher.state(), PublishState::Abandoned);
        assert_eq!(publisher.open_edit_id(), None);
        assert_eq!(
            publisher.backend().calls().last(),
            Some(&Call::Abandon("edit-12".to_string()))
        );

        // Nothing left to abandon
        assert!(!publisher.abandon(|_| {}).await.unwrap());
    }

    #[tokio::test]
    async fn test_abandon_without_edit_is_noop() {
        let mut publisher = publisher(StubBackend::new("edit-13", 1));
        assert!(!publisher.abandon(|_| {}).await.unwrap());
        assert!(publisher.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_publisher_runs_once() {
        let fixture = Fixture::new();
        let mut publisher = publisher(StubBackend::new("edit-14", 1));
        publisher.publish(&fixture.inputs(), |_| {}).await.unwrap();

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();
        assert!(matches!(error, PublishError::Configuration { .. }));
        assert_eq!(publisher.backend().count(|c| matches!(c, Call::OpenEdit)), 1);
    }

    #[tokio::test]
    async fn test_independent_publishes_use_their_own_edits() {
        let first_fixture = Fixture::new();
        let second_fixture = Fixture::new();
        let mut first = publisher(StubBackend::new("edit-a", 100));
        let mut second = publisher(StubBackend::new("edit-b", 200));

        let (first_inputs, second_inputs) = (first_fixture.inputs(), second_fixture.inputs());

        let (a, b) = tokio::join!(
            first.publish(&first_inputs, |_| {}),
            second.publish(&second_inputs, |_| {})
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!((a.edit_id.as_str(), a.version_code), ("edit-a", 100));
        assert_eq!((b.edit_id.as_str(), b.version_code), ("edit-b", 200));
        assert!(
            !first
                .backend()
                .calls()
                .contains(&Call::Commit("edit-b".to_string(), false))
        );
    }

    #[tokio::test]
    async fn test_held_lock_blocks_second_publish() {
        let fixture = Fixture::new();
        let locks = TempDir::new().unwrap();
        let _held = PackageLock::acquire(locks.path(), PACKAGE, Duration::ZERO)
            .await
            .unwrap();
        let mut publisher =
            publisher(StubBackend::new("edit-15", 1)).with_lock(locks.path(), Duration::from_millis(150));

        let error = publisher.publish(&fixture.inputs(), |_| {}).await.unwrap_err();

        assert!(matches!(error, PublishError::Lock { .. }));
        assert!(publisher.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_lock_released_after_commit() {
        let fixture = Fixture::new();
        let locks = TempDir::new().unwrap();
        let mut publisher =
            publisher(StubBackend::new("edit-16", 1)).with_lock(locks.path(), Duration::ZERO);

        publisher.publish(&fixture.inputs(), |_| {}).await.unwrap();

        assert!(
            PackageLock::acquire(locks.path(), PACKAGE, Duration::ZERO)
                .await
                .is_ok()
        );
    }
}
