//! The check pipeline
//!
//! lock → cache → resolve → scan/save per file → aggregate → cache → unlock.
//! Every fatal error becomes an UNKNOWN outcome; per-file read and decode
//! errors are isolated to their file.

use crate::aggregator::OutcomeAggregator;
use crate::cache::ResultCache;
use crate::config::CheckConfig;
use crate::error::{CheckError, CheckResult};
use crate::lock::RunLock;
use crate::resolver::{expand_targets, FileSetResolver, ResolveOptions, ResolvedTarget};
use crate::scanner::Scanner;
use crate::seek::{cache_path, lock_path, SeekIdentity, SeekRecord, SeekStore};
use crate::severity::CheckOutcome;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where seek state is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeekLocation {
    /// One derived seek file per target inside this directory
    Directory(PathBuf),
    /// A single caller-named seek file for a single log file
    File(PathBuf),
}

/// What to check in one invocation
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Globs and paths; one entry may hold several separated by spaces
    pub targets: Vec<String>,
    pub seek: SeekLocation,
    pub tag: Option<String>,
    /// Purge expired records of files that are no longer live
    pub remove_stale: bool,
}

impl CheckRequest {
    pub fn new(targets: Vec<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            targets,
            seek: SeekLocation::Directory(state_dir.into()),
            tag: None,
            remove_stale: false,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_seek_file(mut self, seek_file: impl Into<PathBuf>) -> Self {
        self.seek = SeekLocation::File(seek_file.into());
        self
    }

    pub fn remove_stale(mut self, remove: bool) -> Self {
        self.remove_stale = remove;
        self
    }

    /// Directory holding the seek, cache and lock files of this request
    pub fn scope_dir(&self) -> PathBuf {
        match &self.seek {
            SeekLocation::Directory(dir) => dir.clone(),
            SeekLocation::File(file) => match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }
}

/// Runs checks for one validated configuration
#[derive(Debug, Clone)]
pub struct LogChecker {
    config: CheckConfig,
    scanner: Scanner,
}

impl LogChecker {
    pub fn new(config: CheckConfig) -> CheckResult<Self> {
        config.validate()?;
        let scanner = Scanner::new(&config)?;
        Ok(Self { config, scanner })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run one check; always yields exactly one outcome
    pub fn check(&self, request: &CheckRequest) -> CheckOutcome {
        match self.run(request) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Check aborted: {}", e);
                CheckOutcome::unknown(e)
            }
        }
    }

    /// Run one check under the run lock, consulting the result cache
    pub fn run(&self, request: &CheckRequest) -> CheckResult<CheckOutcome> {
        let scope_dir = request.scope_dir();
        let tag = request.tag.as_deref();
        let store = SeekStore::open(&scope_dir)?;

        let lock = RunLock::acquire(&lock_path(&scope_dir, tag), self.config.lock_timeout())?;

        let cache = self
            .config
            .cache
            .then(|| ResultCache::new(cache_path(&scope_dir, tag), self.config.cachetime()));
        if let Some(cache) = &cache {
            if let Some(outcome) = cache.get()? {
                info!("Replaying cached outcome from {}", cache.path().display());
                lock.release();
                return Ok(outcome);
            }
        }

        let outcome = self.scan(&store, request)?;

        // Seek records are already committed at this point
        if let Some(cache) = &cache {
            if let Err(e) = cache.put(&outcome) {
                warn!("Failed to write cache {}: {}", cache.path().display(), e);
            }
        }
        lock.release();
        Ok(outcome)
    }

    /// Resolve, scan and persist without taking the run lock
    pub fn scan(&self, store: &SeekStore, request: &CheckRequest) -> CheckResult<CheckOutcome> {
        let tag = request.tag.as_deref();
        let targets = match &request.seek {
            SeekLocation::Directory(_) => {
                let resolver = self.resolver(store, request);
                let targets = resolver.resolve(&request.targets)?;
                if request.remove_stale {
                    let purged = resolver.purge_stale(&targets, self.config.expiration())?;
                    if !purged.is_empty() {
                        info!("Purged {} expired seek records", purged.len());
                    }
                }
                targets
            }
            SeekLocation::File(seek_file) => explicit_target(store, request, seek_file)?
                .into_iter()
                .collect(),
        };

        let mut aggregator = OutcomeAggregator::new(&self.config);
        for target in targets {
            let offset = target.record.as_ref().map_or(0, |record| record.offset);
            let scan = match self.scanner.scan(&target.path, offset) {
                Ok(scan) => scan,
                Err(e) if e.is_per_file() => {
                    warn!("{}", e);
                    aggregator.record_failure(&e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut record = target
                .record
                .unwrap_or_else(|| SeekRecord::new(&target.path, target.file_id, tag));
            if target.file_id.is_some() {
                record.file_id = target.file_id;
            }
            record.advance(&target.path, scan.new_offset);
            store.save(&target.identity, &record)?;

            aggregator.accumulate(scan);
        }

        debug!(
            "{} warning and {} critical matches",
            aggregator.warning_count(),
            aggregator.critical_count()
        );
        Ok(aggregator.outcome())
    }

    /// Seek identity `path` is currently tracked under for this request
    pub fn seek_identity(&self, request: &CheckRequest, path: &Path) -> CheckResult<SeekIdentity> {
        match &request.seek {
            SeekLocation::File(seek_file) => explicit_identity(seek_file),
            SeekLocation::Directory(dir) => {
                let store = SeekStore::open(dir)?;
                self.resolver(&store, request).identity_for(path)
            }
        }
    }

    /// Path of the seek file `path` is currently tracked in
    pub fn seek_file_path(&self, request: &CheckRequest, path: &Path) -> CheckResult<PathBuf> {
        let identity = self.seek_identity(request, path)?;
        Ok(request.scope_dir().join(identity.file_name()))
    }

    fn resolver<'a>(&self, store: &'a SeekStore, request: &CheckRequest) -> FileSetResolver<'a> {
        FileSetResolver::new(
            store,
            ResolveOptions {
                scantime: self.config.scantime(),
                trace_inode: self.config.trace_inode,
                tag: request.tag.clone(),
            },
        )
    }
}

fn explicit_identity(seek_file: &Path) -> CheckResult<SeekIdentity> {
    let name = seek_file.file_name().ok_or_else(|| {
        CheckError::Config(format!("seek file {} has no file name", seek_file.display()))
    })?;
    Ok(SeekIdentity::from_file_name(name.to_string_lossy()))
}

/// The single target of an explicit seek file. No age filter, no rotation tracking.
fn explicit_target(
    store: &SeekStore,
    request: &CheckRequest,
    seek_file: &Path,
) -> CheckResult<Option<ResolvedTarget>> {
    let files = expand_targets(&request.targets)?;
    let path = match files.as_slice() {
        [] => return Ok(None),
        [path] => path.clone(),
        _ => {
            return Err(CheckError::Config(format!(
                "an explicit seek file takes exactly one log file, got {}",
                files.len()
            )))
        }
    };

    let modified = fs::metadata(&path)
        .and_then(|metadata| metadata.modified())
        .map_err(|source| CheckError::Read {
            path: path.clone(),
            source,
        })?;
    let identity = explicit_identity(seek_file)?;
    let record = store.load(&identity)?;

    Ok(Some(ResolvedTarget {
        path,
        modified,
        file_id: None,
        identity,
        record,
    }))
}
