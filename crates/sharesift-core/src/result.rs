//! Outcomes of evaluating rules.

use serde::{Deserialize, Serialize};

/// What a text rule matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResult {
    /// The pattern that matched, as written in the rule.
    pub pattern: String,
    /// The matched portion of the candidate.
    pub matched: String,
}

impl TextResult {
    pub fn new(pattern: impl Into<String>, matched: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            matched: matched.into(),
        }
    }
}

/// Outcome of evaluating one directory against one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirResult {
    /// Whether the directory should be scanned and recursed into.
    pub scan_dir: bool,
    /// What matched, if the rule matched at all.
    pub matched: Option<TextResult>,
}

impl DirResult {
    /// The rule did not match; keep scanning.
    pub fn scan() -> Self {
        Self {
            scan_dir: true,
            matched: None,
        }
    }

    /// The rule matched and asks for the directory to be skipped.
    pub fn discard(matched: TextResult) -> Self {
        Self {
            scan_dir: false,
            matched: Some(matched),
        }
    }

    /// The rule matched but scanning continues.
    pub fn flagged(matched: TextResult) -> Self {
        Self {
            scan_dir: true,
            matched: Some(matched),
        }
    }
}
