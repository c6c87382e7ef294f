//! Pattern rules and record classification

use crate::config::CheckConfig;
use crate::error::{CheckError, CheckResult};
use regex::{RegexBuilder, RegexSet, RegexSetBuilder};

/// Which severity a matched record counts toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchClass {
    Warning,
    Critical,
}

/// Any-of matcher over one configured pattern list
#[derive(Debug, Clone)]
struct PatternList {
    set: Option<RegexSet>,
}

impl PatternList {
    fn compile(patterns: &[String], case_insensitive: bool) -> CheckResult<Self> {
        if patterns.is_empty() {
            return Ok(Self { set: None });
        }
        // Compile individually first so the error names the offending pattern
        for pattern in patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|source| CheckError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        let set = RegexSetBuilder::new(patterns)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| CheckError::Pattern {
                pattern: patterns.join(" | "),
                source,
            })?;
        Ok(Self { set: Some(set) })
    }

    fn is_match(&self, text: &str) -> bool {
        self.set.as_ref().is_some_and(|set| set.is_match(text))
    }
}

/// The four pattern sets of one check
#[derive(Debug, Clone)]
pub struct PatternRules {
    patterns: PatternList,
    critical_patterns: PatternList,
    negpatterns: PatternList,
    critical_negpatterns: PatternList,
}

impl PatternRules {
    pub fn from_config(config: &CheckConfig) -> CheckResult<Self> {
        let ci = config.case_insensitive;
        Ok(Self {
            patterns: PatternList::compile(&config.pattern_list, ci)?,
            critical_patterns: PatternList::compile(&config.critical_pattern_list, ci)?,
            negpatterns: PatternList::compile(&config.negpattern_list, ci)?,
            critical_negpatterns: PatternList::compile(&config.critical_negpattern_list, ci)?,
        })
    }

    /// Classify one logical record.
    ///
    /// A critical negative pattern silences the record entirely. A plain
    /// negative pattern only keeps it from counting as a warning.
    pub fn classify(&self, text: &str) -> Option<MatchClass> {
        if self.critical_negpatterns.is_match(text) {
            return None;
        }
        if self.critical_patterns.is_match(text) {
            return Some(MatchClass::Critical);
        }
        if self.patterns.is_match(text) && !self.negpatterns.is_match(text) {
            return Some(MatchClass::Warning);
        }
        None
    }
}
