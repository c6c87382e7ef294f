use crate::config::CheckConfig;
use crate::error::{CheckError, CheckResult};
use crate::logformat::LogFormat;
use crate::patterns::{MatchClass, PatternRules};
use encoding_rs::{Encoding, UTF_8};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stands in for `|`, which separates text from perfdata in plugin output
pub const PIPE_PLACEHOLDER: &str = "(pipe)";

/// One logical record that satisfied the pattern rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub text: String,
    pub class: MatchClass,
    pub path: PathBuf,
}

/// Result of scanning the unseen tail of one file
#[derive(Debug, Clone, Default)]
pub struct FileScan {
    pub matches: Vec<MatchRecord>,
    /// Offset at end of file when it was read
    pub new_offset: u64,
    pub bytes_read: u64,
}

/// Reads unseen bytes of a log file and classifies its records
#[derive(Debug, Clone)]
pub struct Scanner {
    rules: PatternRules,
    encoding: &'static Encoding,
    /// Record-start signature, only set in multiline mode
    record_start: Option<LogFormat>,
}

impl Scanner {
    pub fn new(config: &CheckConfig) -> CheckResult<Self> {
        let encoding = Encoding::for_label(config.encoding.as_bytes())
            .ok_or_else(|| CheckError::UnknownEncoding(config.encoding.clone()))?;
        let record_start = if config.multiline {
            Some(LogFormat::new(&config.logformat)?)
        } else {
            None
        };
        Ok(Self {
            rules: PatternRules::from_config(config)?,
            encoding,
            record_start,
        })
    }

    /// Scan `[from_offset, EOF)` of `path`
    ///
    /// A file shorter than `from_offset` was replaced in place, so it is read
    /// again from the start.
    pub fn scan(&self, path: &Path, from_offset: u64) -> CheckResult<FileScan> {
        let read_err = |source| CheckError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(read_err)?;
        let end = file.metadata().map_err(read_err)?.len();

        let start = if end < from_offset {
            info!(
                "{} shrank from {} to {} bytes, reading from the start",
                path.display(),
                from_offset,
                end
            );
            0
        } else {
            from_offset
        };

        file.seek(SeekFrom::Start(start)).map_err(read_err)?;
        let mut bytes = Vec::with_capacity((end - start) as usize);
        file.take(end - start)
            .read_to_end(&mut bytes)
            .map_err(read_err)?;

        let text = self.decode(path, &bytes)?;
        let matches = self.classify(path, &text);

        debug!(
            "Scanned {} bytes of {} from offset {}: {} matches",
            bytes.len(),
            path.display(),
            start,
            matches.len()
        );

        Ok(FileScan {
            matches,
            new_offset: start + bytes.len() as u64,
            bytes_read: bytes.len() as u64,
        })
    }

    fn decode(&self, path: &Path, bytes: &[u8]) -> CheckResult<String> {
        let decode_err = || CheckError::Decode {
            path: path.to_path_buf(),
            encoding: self.encoding.name(),
        };
        if self.encoding == UTF_8 {
            return std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|_| decode_err());
        }
        self.encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
            .ok_or_else(decode_err)
    }

    /// Classify every logical record of `text`, in file order
    pub fn classify(&self, path: &Path, text: &str) -> Vec<MatchRecord> {
        self.records(text)
            .into_iter()
            .filter_map(|record| {
                let class = self.rules.classify(&record)?;
                Some(MatchRecord {
                    text: record.replace('|', PIPE_PLACEHOLDER),
                    class,
                    path: path.to_path_buf(),
                })
            })
            .collect()
    }

    /// Rebuild logical records from physical lines
    pub fn records(&self, text: &str) -> Vec<String> {
        let Some(format) = &self.record_start else {
            return text.lines().map(str::to_string).collect();
        };

        let mut records: Vec<String> = Vec::new();
        let mut current_header: Option<String> = None;

        for line in text.lines() {
            match format.split(line) {
                Some(parts) => {
                    let continues = current_header.as_deref() == Some(parts.header);
                    match records.last_mut() {
                        Some(record) if continues => {
                            record.push(' ');
                            record.push_str(parts.message);
                        }
                        _ => {
                            records.push(line.to_string());
                            current_header = Some(parts.header.to_string());
                        }
                    }
                }
                None => match records.last_mut() {
                    Some(record) => {
                        record.push(' ');
                        record.push_str(line);
                    }
                    None => records.push(line.to_string()),
                },
            }
        }
        records
    }
}
