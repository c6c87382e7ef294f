//! Record-start signatures for multiline reconstruction
//!
//! A log format is a regular expression with at least two capture groups: the
//! first captures the record header (timestamp, host, tag), the last captures
//! the message. `%`-tokens in the style of strftime are expanded before the
//! regex is compiled, so `%b %e %T` matches `Dec  5 12:34:50`.

use crate::error::{CheckError, CheckResult};
use regex::Regex;

/// Syslog style: `Dec  5 12:34:50 hostname tag[123]: message`
pub const FORMAT_SYSLOG: &str =
    r"^((?:%b\s%e\s%T|%FT%T\S*)\s[-_0-9A-Za-z.]+\s(?:[^ :\[\]]+(?:\[\d+?\])?:\s)?)(.*)$";

const WEEKDAYS: &str = "(?:Sun|Mon|Tue|Wed|Thu|Fri|Sat)";
const MONTHS: &str = "(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)";

#[derive(Debug, Clone)]
pub struct LogFormat {
    regex: Regex,
}

/// A physical line split by the log format
#[derive(Debug, PartialEq, Eq)]
pub struct LineParts<'a> {
    pub header: &'a str,
    pub message: &'a str,
}

impl LogFormat {
    pub fn new(format: &str) -> CheckResult<Self> {
        let expanded = expand_tokens(format);
        let regex = Regex::new(&expanded).map_err(|e| CheckError::LogFormat {
            format: format.to_string(),
            reason: e.to_string(),
        })?;
        // group 0 is the whole match
        if regex.captures_len() < 3 {
            return Err(CheckError::LogFormat {
                format: format.to_string(),
                reason: "needs a header group and a message group".to_string(),
            });
        }
        Ok(Self { regex })
    }

    pub fn syslog() -> CheckResult<Self> {
        Self::new(FORMAT_SYSLOG)
    }

    /// Split a line into header and message, `None` if it is not a record start
    pub fn split<'a>(&self, line: &'a str) -> Option<LineParts<'a>> {
        let caps = self.regex.captures(line)?;
        let header = caps.get(1)?.as_str();
        let message = caps.get(caps.len() - 1).map_or("", |m| m.as_str());
        Some(LineParts { header, message })
    }
}

/// Expand `%`-tokens into regex fragments
pub fn expand_tokens(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('Y') => out.push_str("[0-9]{4}"),
            Some('y') => out.push_str("[0-9]{2}"),
            Some('a') => out.push_str(WEEKDAYS),
            Some('b') => out.push_str(MONTHS),
            Some('m') => out.push_str("[01][0-9]"),
            Some('d') => out.push_str("[0-3][0-9]"),
            Some('e') => out.push_str("[ 1-3][0-9]"),
            Some('H') => out.push_str("[0-2][0-9]"),
            Some('M') => out.push_str("[0-5][0-9]"),
            Some('S') => out.push_str("[0-6][0-9]"),
            Some('F') => out.push_str(&expand_tokens("%Y-%m-%d")),
            Some('T') => out.push_str(&expand_tokens("%H:%M:%S")),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}
