//! Short-lived result cache
//!
//! When the scheduler invokes the check more often than is useful, the last
//! outcome is replayed verbatim for `cachetime` seconds instead of rescanning.

use crate::error::{CheckError, CheckResult};
use crate::severity::CheckOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// On-disk cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedOutcome {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub outcome: CheckOutcome,
}

impl CachedOutcome {
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        now.signed_duration_since(self.created_at) < ttl
    }
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached outcome if one was written within the last `ttl`
    ///
    /// An unreadable entry is treated as a miss and overwritten by the next put.
    pub fn get(&self) -> CheckResult<Option<CheckOutcome>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckError::state_dir(&self.path, e)),
        };

        let entry: CachedOutcome = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };

        if entry.is_fresh(self.ttl, Utc::now()) {
            debug!("Cache hit {}", self.path.display());
            Ok(Some(entry.outcome))
        } else {
            debug!("Cache expired {}", self.path.display());
            Ok(None)
        }
    }

    pub fn put(&self, outcome: &CheckOutcome) -> CheckResult<()> {
        self.write_entry(&CachedOutcome {
            created_at: Utc::now(),
            outcome: outcome.clone(),
        })
    }

    /// Replace the entry on disk
    pub fn write_entry(&self, entry: &CachedOutcome) -> CheckResult<()> {
        let json = serde_json::to_vec_pretty(entry).map_err(|source| CheckError::CorruptState {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| CheckError::state_dir(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| CheckError::state_dir(&self.path, e))?;
        Ok(())
    }
}
