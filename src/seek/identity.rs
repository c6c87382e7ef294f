//! Deterministic names for persisted state
//!
//! Seek file names are derived from the tag, the target path and, when
//! rotation tracking is on, the platform file identity. The readable part of
//! the name comes from the file name; a blake3 digest over the full inputs
//! keeps distinct targets from colliding.

use super::record::FileId;
use std::path::{Path, PathBuf};

const PREFIX_DATA: &str = ".logsentry";
const SUFFIX_SEEK: &str = "seek";
const SUFFIX_CACHE: &str = ".cache";
const SUFFIX_LOCK: &str = ".lock";

/// Name of one seek file inside a scope directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeekIdentity(String);

impl SeekIdentity {
    pub fn derive(tag: Option<&str>, path: &Path, file_id: Option<FileId>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tag.unwrap_or("").as_bytes());
        hasher.update(&[0]);
        hasher.update(path.to_string_lossy().as_bytes());
        if let Some(id) = file_id {
            hasher.update(&[0]);
            hasher.update(format!("{}:{}", id.dev, id.ino).as_bytes());
        }
        let digest = hasher.finalize().to_hex();

        let readable = path
            .file_name()
            .map(|name| sanitize(&name.to_string_lossy()))
            .unwrap_or_else(|| "log".to_string());

        let mut name = readable;
        if let Some(tag) = tag {
            name.push('.');
            name.push_str(&sanitize(tag));
        }
        name.push('.');
        name.push_str(&digest.as_str()[..16]);
        name.push('.');
        name.push_str(SUFFIX_SEEK);
        Self(name)
    }

    /// Use an explicit seek file name as-is
    pub fn from_file_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn file_name(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_seek_file(name: &str) -> bool {
        Path::new(name)
            .extension()
            .is_some_and(|ext| ext == SUFFIX_SEEK)
    }
}

/// Shared prefix of the cache and lock files of one scope
pub fn data_file_prefix(state_dir: &Path, tag: Option<&str>) -> PathBuf {
    match tag {
        Some(tag) => state_dir.join(format!("{}.{}", PREFIX_DATA, sanitize(tag))),
        None => state_dir.join(PREFIX_DATA),
    }
}

pub fn cache_path(state_dir: &Path, tag: Option<&str>) -> PathBuf {
    with_suffix(data_file_prefix(state_dir, tag), SUFFIX_CACHE)
}

pub fn lock_path(state_dir: &Path, tag: Option<&str>) -> PathBuf {
    with_suffix(data_file_prefix(state_dir, tag), SUFFIX_LOCK)
}

fn with_suffix(prefix: PathBuf, suffix: &str) -> PathBuf {
    let mut os = prefix.into_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
