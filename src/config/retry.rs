//! Retry configuration for idempotent backend calls.
//!
//! Upload and commit are never retried; every other call may be repeated when
//! it fails transiently.

use crate::error::{PublishError, PublishStep, Result};
use serde::{Deserialize, Serialize};

/// Retry limits per operation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Max retries for the OAuth token exchange
    pub authenticate: u32,

    /// Max retries for opening an edit
    pub open_edit: u32,

    /// Max retries for the track update
    pub assign_track: u32,

    /// Max retries for attaching release notes
    pub release_notes: u32,

    /// Max retries for abandoning a failed edit
    pub abandon: u32,

    /// First back-off delay in milliseconds; doubles per attempt
    pub base_delay_ms: u64,

    /// Ceiling for a single back-off delay in milliseconds
    pub max_delay_ms: u64,
}

const MAX_RETRIES: u32 = 10;

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            authenticate: 3,
            open_edit: 2,
            assign_track: 3,
            release_notes: 2,
            abandon: 2,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// No retries and no delay
    pub fn none() -> Self {
        Self {
            authenticate: 0,
            open_edit: 0,
            assign_track: 0,
            release_notes: 0,
            abandon: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Retry budget for a backend step
    pub fn retries_for(&self, step: PublishStep) -> u32 {
        if !step.is_idempotent() {
            return 0;
        }
        match step {
            PublishStep::OpenEdit => self.open_edit,
            PublishStep::AssignTrack => self.assign_track,
            PublishStep::ReleaseNotes => self.release_notes,
            PublishStep::Abandon => self.abandon,
            PublishStep::UploadBundle | PublishStep::Commit => 0,
        }
    }

    /// Parse retry count with clamping to maximum
    fn parse_retry(value: Option<String>, current: u32) -> u32 {
        value
            .and_then(|s| s.trim().parse::<u32>().ok())
            .map(|v| v.min(MAX_RETRIES))
            .unwrap_or(current)
    }

    /// Override fields from `PLAY_RETRY_*` variables found through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.authenticate = Self::parse_retry(lookup("PLAY_RETRY_AUTH"), self.authenticate);
        self.open_edit = Self::parse_retry(lookup("PLAY_RETRY_OPEN_EDIT"), self.open_edit);
        self.assign_track = Self::parse_retry(lookup("PLAY_RETRY_TRACK"), self.assign_track);
        self.release_notes = Self::parse_retry(lookup("PLAY_RETRY_NOTES"), self.release_notes);
        self.abandon = Self::parse_retry(lookup("PLAY_RETRY_ABANDON"), self.abandon);
        if let Some(delay) = lookup("PLAY_RETRY_BASE_DELAY_MS").and_then(|s| s.trim().parse().ok()) {
            self.base_delay_ms = delay;
        }
    }

    /// Validate retry counts are reasonable
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("authenticate", self.authenticate),
            ("open_edit", self.open_edit),
            ("assign_track", self.assign_track),
            ("release_notes", self.release_notes),
            ("abandon", self.abandon),
        ];
        for (name, count) in counts {
            if count > MAX_RETRIES {
                return Err(PublishError::config(format!(
                    "retry.{} too high: {} (max: {})",
                    name, count, MAX_RETRIES
                )));
            }
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(PublishError::config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}
