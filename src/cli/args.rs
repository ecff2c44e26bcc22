//! Command line argument parsing.
//!
//! Every input can also come from the environment, so the tool drops into a CI
//! job that exports `PACKAGE_NAME` and `PLAY_STORE_SERVICE_ACCOUNT_PATH`.

use crate::config::PublishInputs;
use clap::Parser;
use std::path::PathBuf;

/// Publish an Android App Bundle to a Google Play track
#[derive(Parser, Debug)]
#[command(
    name = "play_publisher",
    version,
    about = "Publish an Android App Bundle to a Google Play track",
    long_about = "Upload an .aab to Google Play through a single edit: open edit, upload bundle,
assign it to a track as a completed release, attach release notes from
distribution/whatsnew/en-US.txt when present, then commit.

Usage:
  PACKAGE_NAME=com.example.app \\
  PLAY_STORE_SERVICE_ACCOUNT_PATH=key.json \\
  play_publisher app/build/outputs/bundle/release/app-release.aab

  play_publisher app.aab --track beta --package com.example.app --service-account key.json"
)]
pub struct Args {
    /// Android App Bundle (.aab) to upload
    #[arg(index = 1, value_name = "BUNDLE")]
    pub bundle: Option<PathBuf>,

    /// Application package name
    #[arg(long = "package", value_name = "NAME", env = "PACKAGE_NAME")]
    pub package_name: Option<String>,

    /// Service account key file (JSON)
    #[arg(long, value_name = "PATH", env = "PLAY_STORE_SERVICE_ACCOUNT_PATH")]
    pub service_account: Option<PathBuf>,

    /// Release track: internal, alpha, beta or production
    #[arg(long, value_name = "TRACK", env = "PLAY_TRACK")]
    pub track: Option<String>,

    /// Project root; release notes are read from distribution/whatsnew/en-US.txt below it
    #[arg(long, value_name = "DIR", env = "PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(long, value_name = "PATH", env = "PLAY_PUBLISHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Check inputs and exit without contacting Google Play
    #[arg(long)]
    pub validate_only: bool,

    /// Leave the edit open when publishing fails instead of deleting it
    #[arg(long)]
    pub keep_edit_on_failure: bool,

    /// Commit without sending the changes for review
    #[arg(long)]
    pub changes_not_sent_for_review: bool,

    /// Print debug details
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Raw publish inputs; checked later by [`PublishInputs::validate`]
    pub fn inputs(&self) -> PublishInputs {
        PublishInputs {
            bundle_path: self.bundle.clone(),
            package_name: self.package_name.clone(),
            service_account_path: self.service_account.clone(),
            track: self.track.clone(),
            project_dir: self.project_dir.clone(),
        }
    }
}
