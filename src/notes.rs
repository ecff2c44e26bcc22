//! Release notes picked up from the conventional `distribution/whatsnew` file.

use crate::config::RELEASE_NOTES_LANGUAGE;
use crate::error::Result;
use std::io::ErrorKind;
use std::path::Path;

/// Google Play rejects notes longer than this, per language
pub const MAX_RELEASE_NOTES_CHARS: usize = 500;

/// Plain-text notes for one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNotes {
    /// BCP-47 language tag
    pub language: String,
    /// Notes body
    pub text: String,
}

impl ReleaseNotes {
    /// Notes in the default language
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            language: RELEASE_NOTES_LANGUAGE.to_string(),
            text: text.into(),
        }
    }

    /// Length in characters, as Play counts it
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Load notes if the file exists and has content
///
/// A missing or blank file yields `Ok(None)`. Any other read failure is an error.
pub async fn load_release_notes(path: &Path) -> Result<Option<ReleaseNotes>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No release notes at {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let text = text.trim_end();
    if text.trim().is_empty() {
        log::debug!("Release notes file {} is blank; skipping", path.display());
        return Ok(None);
    }

    let notes = ReleaseNotes::new(text);
    if notes.char_count() > MAX_RELEASE_NOTES_CHARS {
        log::warn!(
            "Release notes are {} characters; Google Play accepts at most {}",
            notes.char_count(),
            MAX_RELEASE_NOTES_CHARS
        );
    }
    Ok(Some(notes))
}
