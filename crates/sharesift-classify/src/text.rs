//! Evaluating a rule's patterns against a candidate string.

use sharesift_core::{ClassifierRule, CompiledPatterns, MatchLocation, RuleError, TextResult};

/// Evaluates a single rule against a single candidate string.
///
/// Returns `Ok(None)` when the rule does not match. An `Err` means the rule
/// could not be evaluated at all; callers treat that rule as non-matching.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, rule: &ClassifierRule, candidate: &str)
    -> Result<Option<TextResult>, RuleError>;
}

/// Default evaluator over a rule's compiled patterns.
///
/// Patterns are tried in the order they were written; the first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextClassifier;

impl TextClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEvaluator for TextClassifier {
    fn evaluate(
        &self,
        rule: &ClassifierRule,
        candidate: &str,
    ) -> Result<Option<TextResult>, RuleError> {
        if let MatchLocation::FileLength { .. } = rule.location {
            return Err(RuleError::NotTextual {
                rule: rule.name.clone(),
                location: rule.location,
            });
        }

        let result = match rule.compiled() {
            CompiledPatterns::Regex(regexes) => regexes
                .iter()
                .zip(&rule.patterns)
                .find_map(|(regex, pattern)| {
                    regex
                        .find(candidate)
                        .map(|m| TextResult::new(pattern.as_str(), m.as_str()))
                }),
            CompiledPatterns::Glob(set) => set
                .matches(candidate)
                .first()
                .and_then(|&idx| rule.patterns.get(idx))
                .map(|pattern| TextResult::new(pattern.as_str(), candidate)),
            CompiledPatterns::None => None,
        };

        Ok(result)
    }
}
