use sharesift_core::{
    ClassifierRule, CompiledPatterns, ConfigError, EnumerationScope, FileIdentity, MatchAction,
    MatchListType, MatchLocation, OverlayIdentity, RuleDefinition, RuleSet, Triage, WalkConfig,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_real_identity_from_disk() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("backup.kdbx.bak");
    fs::write(&path, "12345").unwrap();

    let identity = FileIdentity::from_path(&path, None).unwrap();
    assert!(!identity.is_overlay());
    assert_eq!(identity.name(), "backup.kdbx.bak");
    assert_eq!(identity.extension(), ".bak");
    assert_eq!(identity.length(), 5);
    assert_eq!(identity.full_path(), path.as_path());
}

#[test]
fn test_overlay_identity_from_disk_keeps_physical_length() {
    let temp = TempDir::new().unwrap();
    let blob = temp.path().join("ABCD1234");
    fs::write(&blob, "secret bytes").unwrap();

    let overlay = OverlayIdentity::new("/share/SCCMContentLib/DataLib/pkg/web.config");
    let identity = FileIdentity::from_path(&blob, Some(&overlay)).unwrap();

    assert!(identity.is_overlay());
    assert_eq!(identity.name(), "web.config");
    assert_eq!(identity.extension(), ".config");
    assert_eq!(identity.length(), 12);
    assert_eq!(identity.physical_path(), blob.as_path());
}

#[test]
fn test_identity_from_missing_path_fails() {
    let result = FileIdentity::from_path(Path::new("/definitely/not/here"), None);
    assert!(result.is_err());
}

#[test]
fn test_overlay_without_extension() {
    let overlay = OverlayIdentity::new("/lib/DataLib/pkg/Makefile");
    assert_eq!(overlay.name.as_str(), "Makefile");
    assert_eq!(overlay.extension.as_str(), "");
}

#[test]
fn test_rule_set_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("rules.toml");
    fs::write(
        &path,
        r#"
        [[rules]]
        name = "SkipBackups"
        scope = "DirectoryEnumeration"
        location = { kind = "FileName" }
        action = "Discard"
        list_type = "StartsWith"
        patterns = ["backup"]

        [[rules]]
        name = "Configs"
        scope = "FileEnumeration"
        location = { kind = "FileExtension" }
        action = "Snaffle"
        patterns = [".config"]
        triage = "Yellow"
        "#,
    )
    .unwrap();

    let rules = RuleSet::load(&path).unwrap();
    assert_eq!(rules.directory.len(), 1);
    assert_eq!(rules.file.len(), 1);
    assert_eq!(rules.file[0].triage, Triage::Yellow);
    assert_eq!(rules.directory[0].list_type, MatchListType::StartsWith);
}

#[test]
fn test_rule_set_load_missing_file() {
    let err = RuleSet::load(Path::new("/no/such/rules.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_push_routes_by_scope() {
    let mut rules = RuleSet::new();
    assert!(rules.is_empty());

    let rule = ClassifierRule::compile(RuleDefinition {
        name: "Contents".to_string(),
        description: String::new(),
        scope: EnumerationScope::ContentsEnumeration,
        location: MatchLocation::FileContent,
        action: MatchAction::Snaffle,
        list_type: MatchListType::Contains,
        patterns: vec!["password=".to_string()],
        triage: Triage::Red,
    })
    .unwrap();
    rules.push(rule);

    assert_eq!(rules.contents.len(), 1);
    assert!(rules.file.is_empty());
    assert!(matches!(
        rules.contents[0].compiled(),
        CompiledPatterns::Regex(r) if r.len() == 1
    ));
}

#[test]
fn test_walk_config_deserializes_with_defaults() {
    let config: WalkConfig = toml::from_str("file_threads = 3").unwrap();
    assert_eq!(config.file_threads, 3);
    assert_eq!(config.blob_dir, "FileLib");
    assert_eq!(config.sidecar_extension, ".INI");
    assert!(config.apply_dir_rules_in_library);
    assert!(config.follow_dir_links);
}
