//! Classifier rule definitions and compiled rules.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::ConfigError;

/// Which stage of the scan a rule participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum EnumerationScope {
    /// Evaluated against subdirectories before recursing into them.
    DirectoryEnumeration,
    /// Evaluated against each discovered file.
    FileEnumeration,
    /// Evaluated against files that already matched a file rule.
    PostMatch,
    /// Evaluated against file contents by the content inspector.
    ContentsEnumeration,
}

/// The attribute of a file or directory a rule inspects.
///
/// Only the length location carries data; every other location compares a
/// string drawn from the file's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MatchLocation {
    /// The dotted extension, e.g. `.kdbx`.
    FileExtension,
    /// The base name.
    FileName,
    /// The full path.
    FilePath,
    /// The byte length, compared for exact equality.
    FileLength { length: u64 },
    /// The leading bytes of the file read as text.
    FileContent,
}

/// What happens when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum MatchAction {
    /// Drop the directory or file from further consideration.
    Discard,
    /// Report the file as a finding.
    Snaffle,
    /// Hand the file to further rules by name.
    Relay,
    /// Inspect the file for private key material.
    CheckForKeys,
}

/// How a rule's patterns are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum MatchListType {
    /// Whole-string equality.
    #[default]
    Exact,
    /// Substring anywhere.
    Contains,
    /// Raw regular expression.
    Regex,
    /// Suffix.
    EndsWith,
    /// Prefix.
    StartsWith,
    /// Shell-style glob.
    Glob,
}

/// Severity attached to findings produced by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Display, Serialize, Deserialize)]
pub enum Triage {
    Black,
    Red,
    Yellow,
    #[default]
    Green,
}

/// A rule as written in a rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique rule name, used in log lines.
    pub name: String,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: String,

    /// Stage this rule runs in.
    pub scope: EnumerationScope,

    /// Attribute inspected.
    pub location: MatchLocation,

    /// Action on match.
    pub action: MatchAction,

    /// How patterns are interpreted.
    #[serde(default)]
    pub list_type: MatchListType,

    /// Patterns to match against.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Severity of findings.
    #[serde(default)]
    pub triage: Triage,
}

/// Patterns compiled for fast case-insensitive matching.
#[derive(Debug, Clone)]
pub enum CompiledPatterns {
    /// One regex per source pattern, in source order.
    Regex(Vec<Regex>),
    /// A glob set whose match indices refer back to the source patterns.
    Glob(GlobSet),
    /// The rule never consults patterns (length rules).
    None,
}

/// An immutable, compiled classifier rule.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub name: String,
    pub description: String,
    pub scope: EnumerationScope,
    pub location: MatchLocation,
    pub action: MatchAction,
    pub list_type: MatchListType,
    pub patterns: Vec<String>,
    pub triage: Triage,
    compiled: CompiledPatterns,
}

impl ClassifierRule {
    /// Compile a rule definition.
    pub fn compile(def: RuleDefinition) -> Result<Self, ConfigError> {
        let compiled = match def.location {
            MatchLocation::FileLength { .. } => CompiledPatterns::None,
            _ if def.patterns.is_empty() => {
                return Err(ConfigError::EmptyPatterns { rule: def.name });
            }
            _ => compile_patterns(&def.name, def.list_type, &def.patterns)?,
        };

        Ok(Self {
            name: def.name,
            description: def.description,
            scope: def.scope,
            location: def.location,
            action: def.action,
            list_type: def.list_type,
            patterns: def.patterns,
            triage: def.triage,
            compiled,
        })
    }

    /// Compiled form of this rule's patterns.
    pub fn compiled(&self) -> &CompiledPatterns {
        &self.compiled
    }

    /// Target length for length rules.
    pub fn match_length(&self) -> Option<u64> {
        match self.location {
            MatchLocation::FileLength { length } => Some(length),
            _ => None,
        }
    }
}

fn compile_patterns(
    rule: &str,
    list_type: MatchListType,
    patterns: &[String],
) -> Result<CompiledPatterns, ConfigError> {
    let invalid = |pattern: &str, message: String| ConfigError::InvalidPattern {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        message,
    };

    if list_type == MatchListType::Glob {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(false)
                .build()
                .map_err(|e| invalid(pattern, e.to_string()))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| invalid(&patterns.join(", "), e.to_string()))?;
        return Ok(CompiledPatterns::Glob(set));
    }

    let regexes = patterns
        .iter()
        .map(|pattern| {
            let source = match list_type {
                MatchListType::Exact => format!("^{}$", regex::escape(pattern)),
                MatchListType::Contains => regex::escape(pattern),
                MatchListType::StartsWith => format!("^{}", regex::escape(pattern)),
                MatchListType::EndsWith => format!("{}$", regex::escape(pattern)),
                MatchListType::Regex | MatchListType::Glob => pattern.clone(),
            };
            RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|e| invalid(pattern, e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledPatterns::Regex(regexes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(location: MatchLocation, list_type: MatchListType, patterns: &[&str]) -> RuleDefinition {
        RuleDefinition {
            name: "TestRule".to_string(),
            description: String::new(),
            scope: EnumerationScope::FileEnumeration,
            location,
            action: MatchAction::Snaffle,
            list_type,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            triage: Triage::Red,
        }
    }

    #[test]
    fn test_exact_pattern_is_anchored_and_case_insensitive() {
        let rule = ClassifierRule::compile(def(
            MatchLocation::FileExtension,
            MatchListType::Exact,
            &[".kdbx"],
        ))
        .unwrap();

        let CompiledPatterns::Regex(regexes) = rule.compiled() else {
            panic!("expected regex patterns");
        };
        assert!(regexes[0].is_match(".KDBX"));
        assert!(!regexes[0].is_match(".kdbx.old"));
    }

    #[test]
    fn test_length_rule_needs_no_patterns() {
        let rule = ClassifierRule::compile(def(
            MatchLocation::FileLength { length: 42 },
            MatchListType::Exact,
            &[],
        ))
        .unwrap();
        assert_eq!(rule.match_length(), Some(42));
        assert!(matches!(rule.compiled(), CompiledPatterns::None));
    }

    #[test]
    fn test_text_rule_without_patterns_is_rejected() {
        let err = ClassifierRule::compile(def(MatchLocation::FileName, MatchListType::Exact, &[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPatterns { .. }));
    }

    #[test]
    fn test_invalid_regex_names_rule() {
        let err = ClassifierRule::compile(def(MatchLocation::FileName, MatchListType::Regex, &["("]))
            .unwrap_err();
        assert!(err.to_string().contains("TestRule"));
    }

    #[test]
    fn test_glob_patterns_compile() {
        let rule = ClassifierRule::compile(def(
            MatchLocation::FileName,
            MatchListType::Glob,
            &["*.pfx", "id_*"],
        ))
        .unwrap();
        let CompiledPatterns::Glob(set) = rule.compiled() else {
            panic!("expected glob set");
        };
        assert_eq!(set.matches("ID_RSA"), vec![1]);
    }
}
