//! # Play Publisher
//!
//! Publishes an Android App Bundle to a Google Play release track.
//!
//! A publish is one edit transaction: open an edit, upload the bundle, place
//! the new version code on a track as a completed release, attach release notes
//! when a notes file exists, then commit. Nothing goes live until the commit.
//!
//! ## Usage
//!
//! ```bash
//! PACKAGE_NAME=com.example.app \
//! PLAY_STORE_SERVICE_ACCOUNT_PATH=key.json \
//! play_publisher app-release.aab --track beta
//! ```
//!
//! The workflow itself is backend-agnostic: [`Publisher`] drives any
//! [`PlayBackend`], and [`AndroidPublisherClient`] is the HTTPS implementation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod backend;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod notes;
pub mod publisher;

pub use backend::{AndroidPublisherClient, PlayBackend};
pub use cli::Args;
pub use config::{PublishInputs, PublishRequest, RetryConfig, Settings, Track};
pub use error::{AuthError, BackendFailure, PublishError, PublishStep, Result};
pub use publisher::{NotesOutcome, PublishEvent, PublishReport, PublishState, Publisher};
