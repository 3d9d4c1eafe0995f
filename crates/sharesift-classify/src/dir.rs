//! Directory classification and the recursion gate.

use std::path::Path;
use std::sync::Arc;

use sharesift_core::{ClassifierRule, DirResult, MatchAction, MatchLocation, RuleError, RuleSet};
use tracing::{debug, error, info, trace};

use crate::text::RuleEvaluator;

/// Evaluates one directory against one directory rule.
pub struct DirClassifier<'a> {
    evaluator: &'a dyn RuleEvaluator,
}

impl<'a> DirClassifier<'a> {
    pub fn new(evaluator: &'a dyn RuleEvaluator) -> Self {
        Self { evaluator }
    }

    /// Classify a directory path.
    ///
    /// Path rules see the full path, name rules see the last component. Any
    /// other location cannot describe a directory and is an error.
    pub fn classify_dir(&self, rule: &ClassifierRule, path: &Path) -> Result<DirResult, RuleError> {
        let candidate = match rule.location {
            MatchLocation::FilePath => path.to_string_lossy(),
            MatchLocation::FileName => path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy()),
            location => {
                return Err(RuleError::NotTextual {
                    rule: rule.name.clone(),
                    location,
                });
            }
        };

        let Some(matched) = self.evaluator.evaluate(rule, &candidate)? else {
            return Ok(DirResult::scan());
        };

        Ok(match rule.action {
            MatchAction::Discard => DirResult::discard(matched),
            MatchAction::Snaffle => {
                info!(
                    rule = %rule.name,
                    triage = %rule.triage,
                    path = %path.display(),
                    matched = %matched.matched,
                    "Interesting directory"
                );
                DirResult::flagged(matched)
            }
            MatchAction::Relay | MatchAction::CheckForKeys => DirResult::flagged(matched),
        })
    }
}

/// Decides whether the walker may recurse into a directory.
///
/// Rules are checked in order and the first discard wins. A rule that fails
/// to evaluate is logged and skipped, so one broken rule never blocks
/// unrelated directories.
#[derive(Clone)]
pub struct DirectoryGate {
    rules: Arc<RuleSet>,
    evaluator: Arc<dyn RuleEvaluator>,
}

impl DirectoryGate {
    pub fn new(rules: Arc<RuleSet>, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        Self { rules, evaluator }
    }

    /// Check if a directory should be scanned and recursed into.
    pub fn should_scan(&self, path: &Path) -> bool {
        let classifier = DirClassifier::new(self.evaluator.as_ref());

        for rule in &self.rules.directory {
            match classifier.classify_dir(rule, path) {
                Ok(result) if !result.scan_dir => {
                    trace!(rule = %rule.name, path = %path.display(), "Directory discarded");
                    return false;
                }
                Ok(_) => {}
                Err(e @ RuleError::NotTextual { .. }) => {
                    error!(rule = %rule.name, error = %e, "Misconfigured directory rule");
                }
                Err(e) => {
                    debug!(rule = %rule.name, path = %path.display(), error = %e, "Directory rule failed");
                }
            }
        }

        true
    }
}

impl std::fmt::Debug for DirectoryGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryGate")
            .field("rules", &self.rules.directory.len())
            .finish_non_exhaustive()
    }
}
