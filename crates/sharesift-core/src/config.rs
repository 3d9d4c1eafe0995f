//! Rule sets and walker configuration.

use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rule::{ClassifierRule, EnumerationScope, RuleDefinition};

/// Rules shipped with the binary, used when no rule file is given.
const BUILTIN_RULES: &str = r#"
[[rules]]
name = "DiscardNoiseDirectories"
description = "Directories that are huge and never hold anything interesting."
scope = "DirectoryEnumeration"
location = { kind = "FilePath" }
action = "Discard"
list_type = "EndsWith"
patterns = ["\\winsxs", "\\syswow64", "\\system32", "/node_modules", "\\node_modules", "/.git", "\\.git"]

[[rules]]
name = "KeepPassManagerDatabases"
description = "Password manager databases."
scope = "FileEnumeration"
location = { kind = "FileExtension" }
action = "Snaffle"
list_type = "Exact"
patterns = [".kdbx", ".kdb", ".psafe3", ".kwallet", ".keychain", ".agilekeychain"]
triage = "Black"

[[rules]]
name = "KeepSshKeys"
description = "Private SSH keys by conventional name."
scope = "FileEnumeration"
location = { kind = "FileName" }
action = "Snaffle"
list_type = "Exact"
patterns = ["id_rsa", "id_dsa", "id_ecdsa", "id_ed25519"]
triage = "Black"

[[rules]]
name = "KeepCertificates"
description = "Certificate stores that may hold private keys."
scope = "FileEnumeration"
location = { kind = "FileExtension" }
action = "Snaffle"
list_type = "Exact"
patterns = [".pfx", ".p12", ".pem", ".key", ".ppk"]
triage = "Red"

[[rules]]
name = "KeepUnattendFiles"
description = "Windows answer files often carry credentials."
scope = "FileEnumeration"
location = { kind = "FileName" }
action = "Snaffle"
list_type = "Exact"
patterns = ["unattend.xml", "autounattend.xml", "sysprep.inf"]
triage = "Red"

[[rules]]
name = "DiscardEmptyFiles"
description = "Matched files with no content are not worth reporting."
scope = "PostMatch"
location = { kind = "FileLength", length = 0 }
action = "Discard"

[[rules]]
name = "DiscardSampleCertificates"
description = "Test certificates bundled with common software."
scope = "PostMatch"
location = { kind = "FilePath" }
action = "Discard"
list_type = "Contains"
patterns = ["\\jmxremote", "/jmxremote", "\\python", "/site-packages/", "\\site-packages\\", "/test/", "\\test\\"]
"#;

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

/// Compiled rules grouped by the stage they run in.
///
/// Read-only after load; shared across all worker threads.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Rules evaluated against subdirectories before recursion.
    pub directory: Vec<ClassifierRule>,
    /// Rules evaluated against each discovered file.
    pub file: Vec<ClassifierRule>,
    /// Discard rules evaluated after a file rule matched.
    pub post_match: Vec<ClassifierRule>,
    /// Rules for the content inspector.
    pub contents: Vec<ClassifierRule>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile rule definitions, preserving their order within each scope.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = RuleDefinition>,
    ) -> Result<Self, ConfigError> {
        let mut set = Self::new();
        for def in definitions {
            set.push(ClassifierRule::compile(def)?);
        }
        Ok(set)
    }

    /// Parse a TOML rule file body.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = toml::from_str(source)?;
        Self::from_definitions(file.rules)
    }

    /// Load a TOML rule file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// The built-in default rules.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    /// Add a compiled rule to the list for its scope.
    pub fn push(&mut self, rule: ClassifierRule) {
        match rule.scope {
            EnumerationScope::DirectoryEnumeration => self.directory.push(rule),
            EnumerationScope::FileEnumeration => self.file.push(rule),
            EnumerationScope::PostMatch => self.post_match.push(rule),
            EnumerationScope::ContentsEnumeration => self.contents.push(rule),
        }
    }

    /// Total number of rules across all scopes.
    pub fn len(&self) -> usize {
        self.directory.len() + self.file.len() + self.post_match.len() + self.contents.len()
    }

    /// Check if no rules are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration for the tree walker and its work pools.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WalkConfig {
    /// Threads in the file-scan pool (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub file_threads: usize,

    /// Threads in the directory-walk pool (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub tree_threads: usize,

    /// Queued file jobs before submitters block (0 = unbounded).
    #[builder(default = "0")]
    #[serde(default)]
    pub max_file_backlog: usize,

    /// Queued directory jobs before submitters block (0 = unbounded).
    #[builder(default = "0")]
    #[serde(default)]
    pub max_tree_backlog: usize,

    /// Directory names that mark a content library (exact, case-sensitive).
    #[builder(default = "default_library_names()")]
    #[serde(default = "default_library_names")]
    pub library_names: Vec<String>,

    /// Name of the library's metadata subdirectory.
    #[builder(default = "default_metadata_dir()")]
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: String,

    /// Name of the library's blob subdirectory.
    #[builder(default = "default_blob_dir()")]
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,

    /// Extension of metadata sidecar files, including the dot.
    #[builder(default = "default_sidecar_extension()")]
    #[serde(default = "default_sidecar_extension")]
    pub sidecar_extension: String,

    /// Line a sidecar must start with to describe a file.
    #[builder(default = "default_header_marker()")]
    #[serde(default = "default_header_marker")]
    pub header_marker: String,

    /// Apply directory discard rules inside the library's metadata tree.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub apply_dir_rules_in_library: bool,

    /// Recurse into directories reached through symbolic links.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub follow_dir_links: bool,

    /// Bytes of a file read for content rules.
    #[builder(default = "default_max_content_bytes()")]
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,
}

fn default_library_names() -> Vec<String> {
    vec!["SCCMContentLib".to_string(), "SCCMContentLib$".to_string()]
}

fn default_metadata_dir() -> String {
    "DataLib".to_string()
}

fn default_blob_dir() -> String {
    "FileLib".to_string()
}

fn default_sidecar_extension() -> String {
    ".INI".to_string()
}

fn default_header_marker() -> String {
    "[File]".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_content_bytes() -> u64 {
    1024 * 1024
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\'])
}

impl WalkConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref ext) = self.sidecar_extension {
            if ext.len() < 2 || !ext.starts_with('.') {
                return Err(format!("Sidecar extension must start with a dot: {ext:?}"));
            }
        }
        if let Some(ref names) = self.library_names {
            if names.iter().any(|n| !is_plain_name(n)) {
                return Err("Library names must be plain directory names".to_string());
            }
        }
        for dir in [&self.metadata_dir, &self.blob_dir].into_iter().flatten() {
            if !is_plain_name(dir) {
                return Err(format!("Library subdirectory must be a plain name: {dir:?}"));
            }
        }
        Ok(())
    }
}

impl From<WalkConfigBuilderError> for ConfigError {
    fn from(err: WalkConfigBuilderError) -> Self {
        ConfigError::Invalid {
            message: err.to_string(),
        }
    }
}

impl WalkConfig {
    /// Create a new walk config builder.
    pub fn builder() -> WalkConfigBuilder {
        WalkConfigBuilder::default()
    }

    /// Check if a directory name marks a content library.
    pub fn is_library_name(&self, name: &str) -> bool {
        self.library_names.iter().any(|n| n == name)
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            file_threads: 0,
            tree_threads: 0,
            max_file_backlog: 0,
            max_tree_backlog: 0,
            library_names: default_library_names(),
            metadata_dir: default_metadata_dir(),
            blob_dir: default_blob_dir(),
            sidecar_extension: default_sidecar_extension(),
            header_marker: default_header_marker(),
            apply_dir_rules_in_library: true,
            follow_dir_links: true,
            max_content_bytes: default_max_content_bytes(),
        }
    }
}
