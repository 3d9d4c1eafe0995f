//! Classification for sharesift.
//!
//! This crate decides what the walker should care about:
//!
//! - **Rule evaluation** - Match a rule's patterns against a string
//! - **Directory gate** - Decide whether to recurse into a directory
//! - **Post-match classification** - Second-chance discard for matched files
//! - **Rule scanner** - A default file-scan pipeline built from the above
//!
//! # Directory Gate
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sharesift_classify::{DirectoryGate, TextClassifier};
//! use sharesift_core::RuleSet;
//!
//! let rules = Arc::new(RuleSet::builtin()?);
//! let gate = DirectoryGate::new(rules, Arc::new(TextClassifier::new()));
//!
//! if gate.should_scan(Path::new("/mnt/share/Users")) {
//!     // recurse
//! }
//! ```
//!
//! # Post-Match Classification
//!
//! A file that matched a file rule is re-examined by every post-match rule;
//! any rule with a `Discard` action that matches drops the finding. Files
//! named like `secret.kdbx.bak` are matched by their inner extension.

mod dir;
mod file;
mod postmatch;
mod text;

pub use dir::{DirClassifier, DirectoryGate};
pub use file::{FileFinding, RuleScanner};
pub use postmatch::{PostMatchClassifier, extension_for_match, size_match};
pub use text::{RuleEvaluator, TextClassifier};

// Re-export core types
pub use sharesift_core::{ClassifierRule, DirResult, FileIdentity, RuleSet, TextResult};
