//! Command execution: wires settings, the HTTP backend and the publisher together.

use crate::backend::{AndroidPublisherClient, CommitOptions};
use crate::cli::{Args, OutputManager};
use crate::config::Settings;
use crate::error::{PublishError, Result};
use crate::publisher::{NotesOutcome, PublishReport, Publisher};

/// Run the publish described by `args` and return the process exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    let output = OutputManager::new(args.verbose, args.quiet);

    match execute_publish(&args, &output).await {
        Ok(()) => Ok(0),
        Err(e) => {
            report_error(&output, &e);
            Ok(1)
        }
    }
}

async fn execute_publish(args: &Args, output: &OutputManager) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    log::debug!("Effective settings: {:?}", settings);
    let _ = output.verbose(&format!("API base URL: {}", settings.api_base_url));
    let inputs = args.inputs();

    if args.validate_only {
        let request = inputs.validate()?;
        let _ = output.success(&format!(
            "Inputs valid: {} → {} track",
            request.package_name, request.track
        ));
        let _ = output.indent(&format!("Bundle: {}", request.bundle_path.display()));
        let _ = output.indent(&format!(
            "Release notes: {}",
            request.release_notes_path.display()
        ));
        return Ok(());
    }

    let client = AndroidPublisherClient::new(&settings)?;
    let mut publisher = Publisher::new(client)
        .with_retry(settings.retry.clone())
        .with_commit_options(CommitOptions {
            changes_not_sent_for_review: args.changes_not_sent_for_review,
        })
        .with_lock(settings.resolved_lock_dir(), settings.lock_timeout());
    let _ = output.verbose(&format!(
        "Lock directory: {}",
        settings.resolved_lock_dir().display()
    ));

    let _ = output.section("Publishing to Google Play");
    let outcome = publisher.publish(&inputs, |event| output.event(event)).await;
    match outcome {
        Ok(report) => {
            print_summary(output, &report);
            Ok(())
        }
        Err(e) => {
            if let Some(edit_id) = publisher.open_edit_id().map(str::to_string) {
                if args.keep_edit_on_failure {
                    let _ = output.warn(&format!(
                        "Edit {} left open (--keep-edit-on-failure); Google Play expires it on its own",
                        edit_id
                    ));
                } else if let Err(abandon_error) =
                    publisher.abandon(|event| output.event(event)).await
                {
                    let _ = output.warn(&format!(
                        "Could not abandon edit {}: {}",
                        edit_id, abandon_error
                    ));
                }
            }
            Err(e)
        }
    }
}

fn print_summary(output: &OutputManager, report: &PublishReport) {
    let _ = output.success(&format!(
        "Published {} version code {} to the {} track",
        report.package, report.version_code, report.track
    ));
    let _ = output.indent(&format!("Edit: {}", report.edit_id));
    let notes = match &report.notes {
        NotesOutcome::Attached(language) => format!("attached ({})", language),
        NotesOutcome::Skipped => "none".to_string(),
        NotesOutcome::Failed(reason) => format!("not attached: {}", reason),
    };
    let _ = output.indent(&format!("Release notes: {}", notes));
    let _ = output.indent(&format!("Committed at: {}", report.committed_at.to_rfc3339()));
}

/// Suggestions first; the error itself is always the final stderr line.
fn report_error(output: &OutputManager, error: &PublishError) {
    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        output.error_detail("💡 Recovery suggestions:");
        for suggestion in suggestions {
            output.error_detail(&format!("  • {}", suggestion));
        }
        output.error_detail("");
    }

    output.error(&error.to_string());
}
