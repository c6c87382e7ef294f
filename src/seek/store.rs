//! File-per-identity seek state store

use super::identity::SeekIdentity;
use super::record::SeekRecord;
use crate::error::{CheckError, CheckResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Seek records of one scope directory
#[derive(Debug, Clone)]
pub struct SeekStore {
    dir: PathBuf,
}

impl SeekStore {
    /// Open the scope directory, creating it if needed
    ///
    /// Fails when the directory cannot be created; an unusable state
    /// directory must abort the check rather than restart every file at 0.
    pub fn open(dir: &Path) -> CheckResult<Self> {
        fs::create_dir_all(dir).map_err(|e| CheckError::state_dir(dir, e))?;
        let metadata = fs::metadata(dir).map_err(|e| CheckError::state_dir(dir, e))?;
        if !metadata.is_dir() {
            return Err(CheckError::state_dir(
                dir,
                io::Error::new(io::ErrorKind::Other, "not a directory"),
            ));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, identity: &SeekIdentity) -> PathBuf {
        self.dir.join(identity.file_name())
    }

    pub fn load(&self, identity: &SeekIdentity) -> CheckResult<Option<SeekRecord>> {
        read_record(&self.record_path(identity))
    }

    /// Write a record atomically (temp file + rename)
    pub fn save(&self, identity: &SeekIdentity, record: &SeekRecord) -> CheckResult<()> {
        let path = self.record_path(identity);
        let json = serde_json::to_vec_pretty(record).map_err(|source| CheckError::CorruptState {
            path: path.clone(),
            source,
        })?;

        let tmp = self.dir.join(format!("{}.tmp", identity.file_name()));
        fs::write(&tmp, json).map_err(|e| CheckError::state_dir(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| CheckError::state_dir(&path, e))?;

        debug!("Saved seek record {} (offset {})", path.display(), record.offset);
        Ok(())
    }

    pub fn purge(&self, identity: &SeekIdentity) -> CheckResult<()> {
        let path = self.record_path(identity);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Purged seek record {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckError::state_dir(&path, e)),
        }
    }

    /// All seek records of the given tag, sorted by identity
    pub fn list_known(&self, tag: Option<&str>) -> CheckResult<Vec<(SeekIdentity, SeekRecord)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CheckError::state_dir(&self.dir, e))?;

        let mut known = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CheckError::state_dir(&self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !SeekIdentity::is_seek_file(&name) {
                continue;
            }
            // Vanished between read_dir and read: another scope's purge
            let record = match read_record(&entry.path()) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e @ CheckError::CorruptState { .. }) => {
                    warn!("Skipping unreadable seek record: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if record.tag.as_deref() == tag {
                known.push((SeekIdentity::from_file_name(name), record));
            }
        }

        known.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(known)
    }
}

fn read_record(path: &Path) -> CheckResult<Option<SeekRecord>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CheckError::state_dir(path, e)),
    };
    let record = serde_json::from_slice(&content).map_err(|source| CheckError::CorruptState {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(record))
}
