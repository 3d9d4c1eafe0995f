//! Default file-scan pipeline: file rules, content rules, then post-match
//! discards.

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sharesift_core::{
    ClassifierRule, FileIdentity, FileScanner, MatchAction, MatchLocation, OverlayIdentity,
    RuleError, RuleSet, ScanError, TextResult, Triage,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, trace};

use crate::postmatch::{PostMatchClassifier, extension_for_match, size_match};
use crate::text::{RuleEvaluator, TextClassifier};

/// A file that matched a file rule and survived every post-match rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFinding {
    /// Name of the rule that matched.
    pub rule: String,
    /// Severity of the rule.
    pub triage: Triage,
    /// Identity the rules saw (overlay for resolved library content).
    pub identity: FileIdentity,
    /// What matched, for text rules.
    pub matched: Option<TextResult>,
}

/// Classifies files with the file and content rules of a rule set.
///
/// Findings are sent on a channel so the host can consume them while the
/// walk is still running.
pub struct RuleScanner {
    rules: Arc<RuleSet>,
    evaluator: Arc<dyn RuleEvaluator>,
    post_match: PostMatchClassifier,
    max_content_bytes: u64,
    findings: UnboundedSender<FileFinding>,
}

impl RuleScanner {
    /// Create a scanner using the default text classifier.
    pub fn new(rules: Arc<RuleSet>, findings: UnboundedSender<FileFinding>) -> Self {
        Self::with_evaluator(rules, Arc::new(TextClassifier::new()), findings)
    }

    /// Create a scanner with a custom rule evaluator.
    pub fn with_evaluator(
        rules: Arc<RuleSet>,
        evaluator: Arc<dyn RuleEvaluator>,
        findings: UnboundedSender<FileFinding>,
    ) -> Self {
        Self {
            rules,
            post_match: PostMatchClassifier::new(evaluator.clone()),
            evaluator,
            max_content_bytes: 1024 * 1024,
            findings,
        }
    }

    /// Limit how much of a file content rules may read.
    pub fn with_max_content_bytes(mut self, max: u64) -> Self {
        self.max_content_bytes = max;
        self
    }

    /// Classify one identity.
    ///
    /// File rules run first. If none of them keeps or discards the file, the
    /// content rules get their turn. A kept match must then survive every
    /// post-match rule. Returns `None` if nothing matched or a rule discarded
    /// the file. A failing rule is logged and skipped.
    pub fn classify(&self, identity: &FileIdentity) -> Option<FileFinding> {
        let verdict = match self.apply(&self.rules.file, identity) {
            Some(verdict) => verdict,
            None => self.apply(&self.rules.contents, identity)?,
        };

        match verdict {
            Verdict::Discard => None,
            Verdict::Keep(finding) => Some(finding),
        }
    }

    /// First keep or discard decision from `rules`, in order.
    fn apply(&self, rules: &[ClassifierRule], identity: &FileIdentity) -> Option<Verdict> {
        for rule in rules {
            let matched = match self.evaluate(rule, identity) {
                Ok(Some(matched)) => matched,
                Ok(None) => continue,
                Err(RuleError::Content { path, source, .. }) => {
                    trace!(rule = %rule.name, path = %path.display(), error = %source, "Could not read content");
                    continue;
                }
                Err(e) => {
                    error!(rule = %rule.name, error = %e, "Misconfigured rule");
                    continue;
                }
            };

            match rule.action {
                MatchAction::Discard => {
                    trace!(rule = %rule.name, path = %identity.full_path().display(), "File discarded");
                    return Some(Verdict::Discard);
                }
                MatchAction::Snaffle => {
                    if let Some(discard) = self
                        .post_match
                        .any_discards(identity, &self.rules.post_match)
                    {
                        trace!(
                            rule = %rule.name,
                            post_match = %discard.name,
                            path = %identity.full_path().display(),
                            "Match dropped by post-match rule"
                        );
                        return Some(Verdict::Discard);
                    }
                    return Some(Verdict::Keep(FileFinding {
                        rule: rule.name.clone(),
                        triage: rule.triage,
                        identity: identity.clone(),
                        matched: matched.into_text(),
                    }));
                }
                MatchAction::Relay | MatchAction::CheckForKeys => {
                    debug!(rule = %rule.name, action = %rule.action, "Action not handled by the rule scanner");
                }
            }
        }

        None
    }

    fn evaluate(
        &self,
        rule: &ClassifierRule,
        identity: &FileIdentity,
    ) -> Result<Option<RuleMatch>, RuleError> {
        let candidate: Cow<'_, str> = match rule.location {
            MatchLocation::FileExtension => match extension_for_match(identity) {
                Some(extension) => extension,
                None => return Ok(None),
            },
            MatchLocation::FileName => Cow::Borrowed(identity.name()),
            MatchLocation::FilePath => identity.full_path().to_string_lossy(),
            MatchLocation::FileLength { .. } => {
                return Ok(size_match(rule, identity).then_some(RuleMatch::Length));
            }
            MatchLocation::FileContent => Cow::Owned(self.read_content(rule, identity)?),
        };

        Ok(self
            .evaluator
            .evaluate(rule, &candidate)?
            .map(RuleMatch::Text))
    }

    fn read_content(&self, rule: &ClassifierRule, identity: &FileIdentity) -> Result<String, RuleError> {
        let path = identity.physical_path();
        let content_error = |source| RuleError::Content {
            rule: rule.name.clone(),
            path: path.to_path_buf(),
            source,
        };

        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|file| file.take(self.max_content_bytes).read_to_end(&mut bytes))
            .map_err(content_error)?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl FileScanner for RuleScanner {
    fn scan_file(&self, path: &Path, overlay: Option<&OverlayIdentity>) -> Result<(), ScanError> {
        let identity = FileIdentity::from_path(path, overlay).map_err(|e| ScanError::io(path, e))?;

        if let Some(finding) = self.classify(&identity) {
            if self.findings.send(finding).is_err() {
                debug!(path = %path.display(), "Finding receiver dropped");
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for RuleScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleScanner")
            .field("file_rules", &self.rules.file.len())
            .field("content_rules", &self.rules.contents.len())
            .field("post_match_rules", &self.rules.post_match.len())
            .field("max_content_bytes", &self.max_content_bytes)
            .finish_non_exhaustive()
    }
}

enum Verdict {
    Discard,
    Keep(FileFinding),
}

enum RuleMatch {
    Text(TextResult),
    Length,
}

impl RuleMatch {
    fn into_text(self) -> Option<TextResult> {
        match self {
            Self::Text(result) => Some(result),
            Self::Length => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    const RULES: &str = r#"
        [[rules]]
        name = "Databases"
        scope = "FileEnumeration"
        location = { kind = "FileExtension" }
        action = "Snaffle"
        patterns = [".kdbx"]
        triage = "Black"

        [[rules]]
        name = "Passwords"
        scope = "FileEnumeration"
        location = { kind = "FileContent" }
        action = "Snaffle"
        list_type = "Contains"
        patterns = ["password="]
        triage = "Red"

        [[rules]]
        name = "SkipLogs"
        scope = "FileEnumeration"
        location = { kind = "FileExtension" }
        action = "Discard"
        patterns = [".log"]

        [[rules]]
        name = "ConnectionStrings"
        scope = "ContentsEnumeration"
        location = { kind = "FileContent" }
        action = "Snaffle"
        list_type = "Contains"
        patterns = ["connectionstring="]
        triage = "Yellow"

        [[rules]]
        name = "DropEmpty"
        scope = "PostMatch"
        location = { kind = "FileLength", length = 0 }
        action = "Discard"
    "#;

    fn scanner() -> (RuleScanner, mpsc::UnboundedReceiver<FileFinding>) {
        let rules = Arc::new(RuleSet::from_toml_str(RULES).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        (RuleScanner::new(rules, tx), rx)
    }

    #[test]
    fn test_extension_match_produces_finding() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault.kdbx.bak");
        fs::write(&path, "data").unwrap();

        let (scanner, mut rx) = scanner();
        scanner.scan_file(&path, None).unwrap();

        let finding = rx.try_recv().unwrap();
        assert_eq!(finding.rule, "Databases");
        assert_eq!(finding.triage, Triage::Black);
        assert_eq!(finding.matched.unwrap().matched, ".kdbx");
    }

    #[test]
    fn test_post_match_drops_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.kdbx");
        fs::write(&path, "").unwrap();

        let (scanner, mut rx) = scanner();
        scanner.scan_file(&path, None).unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_content_rule_reads_physical_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ABCDEF");
        fs::write(&path, "user=admin\npassword=hunter2\n").unwrap();
        let overlay = OverlayIdentity::new("/lib/DataLib/app/settings.txt");

        let (scanner, mut rx) = scanner();
        scanner.scan_file(&path, Some(&overlay)).unwrap();

        let finding = rx.try_recv().unwrap();
        assert_eq!(finding.rule, "Passwords");
        assert_eq!(finding.identity.name(), "settings.txt");
        assert_eq!(finding.identity.physical_path(), path.as_path());
    }

    #[test]
    fn test_content_scope_rules_run_when_file_rules_undecided() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("web.config");
        fs::write(&path, "<add ConnectionString=\"Server=db\" />").unwrap();

        let (scanner, mut rx) = scanner();
        scanner.scan_file(&path, None).unwrap();

        let finding = rx.try_recv().unwrap();
        assert_eq!(finding.rule, "ConnectionStrings");
        assert_eq!(finding.triage, Triage::Yellow);
    }

    #[test]
    fn test_file_discard_skips_content_rules() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.log");
        fs::write(&path, "connectionstring=leaked").unwrap();

        let (scanner, mut rx) = scanner();
        scanner.scan_file(&path, None).unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_missing_file_is_transient_error() {
        let (scanner, _rx) = scanner();
        let err = scanner
            .scan_file(Path::new("/definitely/missing.kdbx"), None)
            .unwrap_err();
        assert!(err.is_transient());
    }
}
