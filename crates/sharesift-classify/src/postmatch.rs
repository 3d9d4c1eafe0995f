//! Second-pass discard rules for files that already matched.

use std::borrow::Cow;
use std::sync::Arc;

use sharesift_core::{ClassifierRule, FileIdentity, MatchAction, MatchLocation, dotted_extension};
use tracing::{error, trace};

use crate::text::RuleEvaluator;

/// Generic backup suffix that hides the real file type.
const BACKUP_EXTENSION: &str = ".bak";

/// Extension used when matching a file by extension.
///
/// `report.kdbx.bak` is matched as `.kdbx`; `readme.bak` stays `.bak`.
/// Returns `None` for files with no extension at all, which never match.
pub fn extension_for_match(identity: &FileIdentity) -> Option<Cow<'_, str>> {
    let extension = identity.extension();
    if extension.is_empty() {
        return None;
    }

    if extension.eq_ignore_ascii_case(BACKUP_EXTENSION) {
        let name = identity.name();
        let stem = &name[..name.len() - extension.len()];
        let inner = dotted_extension(stem);
        if !inner.is_empty() {
            return Some(Cow::Owned(inner.to_string()));
        }
    }

    Some(Cow::Borrowed(extension))
}

/// Check if a file's length equals a length rule's target.
pub fn size_match(rule: &ClassifierRule, identity: &FileIdentity) -> bool {
    rule.match_length() == Some(identity.length())
}

/// Re-examines matched files against post-match discard rules.
#[derive(Clone)]
pub struct PostMatchClassifier {
    evaluator: Arc<dyn RuleEvaluator>,
}

impl PostMatchClassifier {
    pub fn new(evaluator: Arc<dyn RuleEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Returns `true` when `rule` says the already-matched file should be
    /// dropped, `false` when the primary match stands.
    pub fn reassess(&self, identity: &FileIdentity, rule: &ClassifierRule) -> bool {
        if identity.is_overlay() {
            trace!(
                physical = %identity.physical_path().display(),
                logical = %identity.full_path().display(),
                "Classifying overlay identity"
            );
        }

        let candidate: Cow<'_, str> = match rule.location {
            MatchLocation::FileExtension => match extension_for_match(identity) {
                Some(extension) => extension,
                None => return false,
            },
            MatchLocation::FileName => Cow::Borrowed(identity.name()),
            MatchLocation::FilePath => identity.full_path().to_string_lossy(),
            MatchLocation::FileLength { .. } => {
                if !size_match(rule, identity) {
                    return false;
                }
                return self.discard_action(rule);
            }
            MatchLocation::FileContent => {
                error!(rule = %rule.name, "Misconfigured post-match rule: content is not a post-match location");
                return false;
            }
        };

        match self.evaluator.evaluate(rule, &candidate) {
            Ok(Some(_)) => self.discard_action(rule),
            Ok(None) => false,
            Err(e) => {
                error!(rule = %rule.name, error = %e, "Post-match rule failed");
                false
            }
        }
    }

    /// Check if any of `rules` discards the file.
    pub fn any_discards<'r>(
        &self,
        identity: &FileIdentity,
        rules: impl IntoIterator<Item = &'r ClassifierRule>,
    ) -> Option<&'r ClassifierRule> {
        rules.into_iter().find(|rule| self.reassess(identity, rule))
    }

    fn discard_action(&self, rule: &ClassifierRule) -> bool {
        match rule.action {
            MatchAction::Discard => true,
            action => {
                error!(
                    rule = %rule.name,
                    %action,
                    "Misconfigured post-match rule: only Discard is supported"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for PostMatchClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostMatchClassifier").finish_non_exhaustive()
    }
}
