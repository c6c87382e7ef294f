//! Seek record and platform file identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Platform file identity (device + inode), stable across renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

impl FileId {
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    // No stable file index outside unix; rotation tracking falls back to paths
    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// How far one target has been consumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRecord {
    /// Path of the target when the record was last saved
    pub path: PathBuf,
    /// Byte offset already consumed
    pub offset: u64,
    /// Identity captured at save time when rotation tracking is on
    pub file_id: Option<FileId>,
    /// Caller-supplied scope tag
    pub tag: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl SeekRecord {
    /// Fresh record starting at offset 0
    pub fn new(path: &Path, file_id: Option<FileId>, tag: Option<&str>) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            file_id,
            tag: tag.map(str::to_string),
            updated_at: Utc::now(),
        }
    }

    /// Record the new offset and current location, refreshing the timestamp
    pub fn advance(&mut self, path: &Path, offset: u64) {
        self.path = path.to_path_buf();
        self.offset = offset;
        self.updated_at = Utc::now();
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.updated_at)
    }
}
