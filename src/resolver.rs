//! Target resolution
//!
//! Expands `--logfile` globs and paths into a sorted list of concrete files,
//! drops files that have gone cold (older than `scantime`), maps each file to
//! its seek identity and purges seek records nobody owns anymore.
//!
//! With rotation tracking the identity follows the platform file identity
//! instead of the path: a record created for `app.log` is picked up again
//! after the file has been renamed to `app.log.1`.

use crate::error::{CheckError, CheckResult};
use crate::seek::{FileId, SeekIdentity, SeekRecord, SeekStore};
use chrono::Utc;
use globset::GlobBuilder;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One live file of this invocation, bound to its seek state
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub file_id: Option<FileId>,
    pub identity: SeekIdentity,
    /// Existing record, `None` on first sight
    pub record: Option<SeekRecord>,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub scantime: Duration,
    pub trace_inode: bool,
    pub tag: Option<String>,
}

pub struct FileSetResolver<'a> {
    store: &'a SeekStore,
    options: ResolveOptions,
}

impl<'a> FileSetResolver<'a> {
    pub fn new(store: &'a SeekStore, options: ResolveOptions) -> Self {
        Self { store, options }
    }

    /// Resolve targets into live files, in sorted path order
    pub fn resolve(&self, targets: &[String]) -> CheckResult<Vec<ResolvedTarget>> {
        let now = SystemTime::now();
        let mut by_file_id = if self.options.trace_inode {
            Some(self.known_by_file_id()?)
        } else {
            None
        };

        let mut resolved = Vec::new();
        for path in expand_targets(targets)? {
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .map_err(|source| CheckError::Read { path: path.clone(), source })?;

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > self.options.scantime {
                debug!(
                    "Skipping {}: last modified {}s ago (scantime {}s)",
                    path.display(),
                    age.as_secs(),
                    self.options.scantime.as_secs()
                );
                continue;
            }

            let file_id = if self.options.trace_inode {
                FileId::from_metadata(&metadata)
            } else {
                None
            };
            let (identity, record) = self.bind(&path, file_id, by_file_id.as_mut())?;

            resolved.push(ResolvedTarget {
                path,
                modified,
                file_id,
                identity,
                record,
            });
        }
        Ok(resolved)
    }

    /// Seek identity the given file would be tracked under right now
    pub fn identity_for(&self, path: &Path) -> CheckResult<SeekIdentity> {
        let file_id = if self.options.trace_inode {
            let metadata = fs::metadata(path).map_err(|source| CheckError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            FileId::from_metadata(&metadata)
        } else {
            None
        };
        let mut by_file_id = if file_id.is_some() {
            Some(self.known_by_file_id()?)
        } else {
            None
        };
        Ok(self.bind(path, file_id, by_file_id.as_mut())?.0)
    }

    /// Purge expired records that belong to none of the live targets
    pub fn purge_stale(
        &self,
        live: &[ResolvedTarget],
        expiration: Duration,
    ) -> CheckResult<Vec<SeekIdentity>> {
        let live: HashSet<&SeekIdentity> = live.iter().map(|t| &t.identity).collect();
        let expiration = chrono::Duration::from_std(expiration)
            .map_err(|e| CheckError::Config(format!("expiration out of range: {}", e)))?;
        let now = Utc::now();

        let mut purged = Vec::new();
        for (identity, record) in self.store.list_known(self.options.tag.as_deref())? {
            if live.contains(&identity) || record.age(now) <= expiration {
                continue;
            }
            info!(
                "Purging seek record {} of {} (idle {}s)",
                identity.file_name(),
                record.path.display(),
                record.age(now).num_seconds()
            );
            self.store.purge(&identity)?;
            purged.push(identity);
        }
        Ok(purged)
    }

    fn bind(
        &self,
        path: &Path,
        file_id: Option<FileId>,
        by_file_id: Option<&mut HashMap<FileId, (SeekIdentity, SeekRecord)>>,
    ) -> CheckResult<(SeekIdentity, Option<SeekRecord>)> {
        let tag = self.options.tag.as_deref();

        if let (Some(id), Some(known)) = (file_id, by_file_id) {
            if let Some((identity, record)) = known.remove(&id) {
                if record.path != path {
                    info!(
                        "{} was rotated from {}, continuing at offset {}",
                        path.display(),
                        record.path.display(),
                        record.offset
                    );
                }
                return Ok((identity, Some(record)));
            }
            return Ok((SeekIdentity::derive(tag, path, Some(id)), None));
        }

        let identity = SeekIdentity::derive(tag, path, None);
        let record = self.store.load(&identity)?;
        Ok((identity, record))
    }

    /// Index the scope's records by the file identity they were saved with
    fn known_by_file_id(&self) -> CheckResult<HashMap<FileId, (SeekIdentity, SeekRecord)>> {
        let mut index: HashMap<FileId, (SeekIdentity, SeekRecord)> = HashMap::new();
        for (identity, record) in self.store.list_known(self.options.tag.as_deref())? {
            let Some(file_id) = record.file_id else {
                continue;
            };
            // Keep the most recently used record if an inode shows up twice
            let newer = match index.get(&file_id) {
                Some((_, existing)) => record.updated_at > existing.updated_at,
                None => true,
            };
            if newer {
                index.insert(file_id, (identity, record));
            }
        }
        Ok(index)
    }
}

/// Expand targets into existing files, deduplicated and sorted
///
/// Every entry may hold several whitespace separated globs or paths.
pub fn expand_targets(targets: &[String]) -> CheckResult<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in targets {
        for token in entry.split_whitespace() {
            if is_glob(token) {
                files.extend(expand_glob(token)?);
            } else {
                let path = PathBuf::from(token);
                if path.is_file() {
                    files.insert(path);
                } else {
                    debug!("No such log file: {}", path.display());
                }
            }
        }
    }
    Ok(files.into_iter().collect())
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

fn expand_glob(pattern: &str) -> CheckResult<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| CheckError::Config(format!("invalid logfile pattern '{}': {}", pattern, e)))?
        .compile_matcher();

    let (base, depth) = glob_base(pattern);
    let relative = base.as_os_str().is_empty();
    let root = if relative { PathBuf::from(".") } else { base };

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .max_depth(depth)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let candidate = if relative {
            path.strip_prefix(".").unwrap_or(path)
        } else {
            path
        };
        if matcher.is_match(candidate) {
            files.push(candidate.to_path_buf());
        }
    }
    Ok(files)
}

/// Literal leading directory of a glob and how deep below it matches can be
fn glob_base(pattern: &str) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut depth = 0;
    let mut in_glob = false;
    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if !in_glob && !is_glob(&text) {
            base.push(component.as_os_str());
            continue;
        }
        in_glob = true;
        if text == "**" {
            depth = usize::MAX;
        } else {
            depth = depth.saturating_add(1);
        }
    }
    (base, depth.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn options(trace_inode: bool) -> ResolveOptions {
        ResolveOptions {
            scantime: Duration::from_secs(86_400),
            trace_inode,
            tag: None,
        }
    }

    fn age_file(path: &Path, secs: i64) {
        let past = FileTime::from_unix_time(FileTime::now().unix_seconds() - secs, 0);
        set_file_mtime(path, past).unwrap();
    }

    #[test]
    fn test_expand_glob_sorted_and_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in ["testlog.2", "testlog", "testlog.1", "other"] {
            fs::write(dir.join(name), "x\n").unwrap();
        }

        let glob = dir.join("testlog*").display().to_string();
        let explicit = dir.join("testlog.1").display().to_string();
        let files = expand_targets(&[glob, explicit]).unwrap();

        assert_eq!(
            files,
            vec![dir.join("testlog"), dir.join("testlog.1"), dir.join("testlog.2")]
        );
    }

    #[test]
    fn test_expand_space_separated_paths() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.log"), "x\n").unwrap();
        fs::write(dir.join("b.log"), "x\n").unwrap();

        let spec = format!(
            "{} {} {}",
            dir.join("b.log").display(),
            dir.join("a.log").display(),
            dir.join("missing.log").display()
        );
        let files = expand_targets(&[spec]).unwrap();
        assert_eq!(files, vec![dir.join("a.log"), dir.join("b.log")]);
    }

    #[test]
    fn test_glob_does_not_cross_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("app.log"), "x\n").unwrap();
        fs::write(dir.join("sub").join("app.log"), "x\n").unwrap();

        let files = expand_targets(&[dir.join("*.log").display().to_string()]).unwrap();
        assert_eq!(files, vec![dir.join("app.log")]);

        let files = expand_targets(&[dir.join("*/*.log").display().to_string()]).unwrap();
        assert_eq!(files, vec![dir.join("sub").join("app.log")]);
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("/var/log/app*"), (PathBuf::from("/var/log"), 1));
        assert_eq!(glob_base("/var/*/app*.log"), (PathBuf::from("/var"), 2));
        assert_eq!(glob_base("/var/log/**/*.log").1, usize::MAX);
    }

    #[test]
    fn test_scantime_excludes_cold_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = SeekStore::open(&temp_dir.path().join("seek")).unwrap();
        let cold = temp_dir.path().join("testlog.1");
        let hot = temp_dir.path().join("testlog.2");
        fs::write(&cold, "ERROR\n").unwrap();
        fs::write(&hot, "ERROR\n").unwrap();
        age_file(&cold, 10);

        let resolver = FileSetResolver::new(
            &store,
            ResolveOptions {
                scantime: Duration::from_secs(2),
                ..options(false)
            },
        );
        let spec = vec![temp_dir.path().join("testlog*").display().to_string()];
        let resolved = resolver.resolve(&spec).unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path, hot);
        assert!(resolved[0].record.is_none());
    }

    #[test]
    fn test_path_identity_loads_existing_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = SeekStore::open(&temp_dir.path().join("seek")).unwrap();
        let log = temp_dir.path().join("testlog");
        fs::write(&log, "line\n").unwrap();

        let identity = SeekIdentity::derive(None, &log, None);
        let mut record = SeekRecord::new(&log, None, None);
        record.advance(&log, 5);
        store.save(&identity, &record).unwrap();

        let resolver = FileSetResolver::new(&store, options(false));
        let resolved = resolver.resolve(&[log.display().to_string()]).unwrap();
        assert_eq!(resolved[0].identity, identity);
        assert_eq!(resolved[0].record.as_ref().unwrap().offset, 5);
        assert_eq!(resolver.identity_for(&log).unwrap(), identity);
    }

    #[cfg(unix)]
    #[test]
    fn test_trace_inode_follows_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let store = SeekStore::open(&temp_dir.path().join("seek")).unwrap();
        let log = temp_dir.path().join("testlog");
        let rotated = temp_dir.path().join("testlog.1");
        fs::write(&log, "first\n").unwrap();

        let resolver = FileSetResolver::new(&store, options(true));
        let before = resolver.identity_for(&log).unwrap();
        let file_id = FileId::from_metadata(&fs::metadata(&log).unwrap());
        let mut record = SeekRecord::new(&log, file_id, None);
        record.advance(&log, 6);
        store.save(&before, &record).unwrap();

        fs::rename(&log, &rotated).unwrap();
        fs::write(&log, "new file\n").unwrap();

        let spec = vec![temp_dir.path().join("testlog*").display().to_string()];
        let resolved = resolver.resolve(&spec).unwrap();
        assert_eq!(resolved.len(), 2);

        let fresh = &resolved[0];
        assert_eq!(fresh.path, log);
        assert_ne!(fresh.identity, before);
        assert!(fresh.record.is_none());

        let followed = &resolved[1];
        assert_eq!(followed.path, rotated);
        assert_eq!(followed.identity, before);
        assert_eq!(followed.record.as_ref().unwrap().offset, 6);
        assert_eq!(resolver.identity_for(&rotated).unwrap(), before);
    }

    #[test]
    fn test_without_trace_rename_starts_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let store = SeekStore::open(&temp_dir.path().join("seek")).unwrap();
        let log = temp_dir.path().join("testlog");
        let rotated = temp_dir.path().join("testlog.1");
        fs::write(&log, "first\n").unwrap();

        let resolver = FileSetResolver::new(&store, options(false));
        let identity = resolver.identity_for(&log).unwrap();
        store.save(&identity, &SeekRecord::new(&log, None, None)).unwrap();
        fs::rename(&log, &rotated).unwrap();

        let resolved = resolver.resolve(&[rotated.display().to_string()]).unwrap();
        assert_ne!(resolved[0].identity, identity);
        assert!(resolved[0].record.is_none());
    }

    #[test]
    fn test_purge_only_expired_orphans() {
        let temp_dir = TempDir::new().unwrap();
        let store = SeekStore::open(&temp_dir.path().join("seek")).unwrap();
        let live_log = temp_dir.path().join("testlog.2");
        fs::write(&live_log, "x\n").unwrap();

        let resolver = FileSetResolver::new(&store, options(false));
        let live_identity = resolver.identity_for(&live_log).unwrap();
        let mut live_record = SeekRecord::new(&live_log, None, None);
        live_record.updated_at = Utc::now() - chrono::Duration::seconds(100);
        store.save(&live_identity, &live_record).unwrap();

        let gone = temp_dir.path().join("testlog.9");
        let expired = SeekIdentity::derive(None, &gone, None);
        let mut expired_record = SeekRecord::new(&gone, None, None);
        expired_record.updated_at = Utc::now() - chrono::Duration::seconds(100);
        store.save(&expired, &expired_record).unwrap();

        let recent_gone = temp_dir.path().join("testlog.8");
        let recent = SeekIdentity::derive(None, &recent_gone, None);
        store.save(&recent, &SeekRecord::new(&recent_gone, None, None)).unwrap();

        let live = resolver.resolve(&[live_log.display().to_string()]).unwrap();
        let purged = resolver.purge_stale(&live, Duration::from_secs(10)).unwrap();

        assert_eq!(purged, vec![expired.clone()]);
        assert!(store.load(&expired).unwrap().is_none());
        assert!(store.load(&live_identity).unwrap().is_some());
        assert!(store.load(&recent).unwrap().is_some());
    }
}
