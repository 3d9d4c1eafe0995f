//! Core types and traits for sharesift.
//!
//! This crate provides the data model shared by the classifier and walker
//! crates: file identities (real and overlay), compiled classifier rules,
//! rule sets, walker configuration, and the file-scan pipeline boundary.

mod config;
mod error;
mod identity;
mod result;
mod rule;
mod scanner;

pub use config::{RuleSet, WalkConfig, WalkConfigBuilder};
pub use error::{ConfigError, RuleError, ScanError};
pub use identity::{FileIdentity, OverlayIdentity, dotted_extension};
pub use result::{DirResult, TextResult};
pub use rule::{
    ClassifierRule, CompiledPatterns, EnumerationScope, MatchAction, MatchListType,
    MatchLocation, RuleDefinition, Triage,
};
pub use scanner::FileScanner;
