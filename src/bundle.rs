//! The bundle file being uploaded.

use crate::error::{PublishError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bundle file plus the facts the backend reports back about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifact {
    /// Location on disk
    pub path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the contents
    pub sha256: String,
}

impl BundleArtifact {
    /// Hash the file off the async runtime
    pub async fn inspect(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::inspect_blocking(&path))
            .await
            .map_err(|e| PublishError::Io(std::io::Error::other(e)))?
    }

    fn inspect_blocking(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];
        let mut size_bytes = 0u64;

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            size_bytes += read as u64;
        }

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    /// Compare against a digest reported by the backend, ignoring case
    pub fn matches_sha256(&self, reported: &str) -> bool {
        self.sha256.eq_ignore_ascii_case(reported.trim())
    }
}
