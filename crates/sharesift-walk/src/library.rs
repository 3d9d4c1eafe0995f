//! Resolving content-library sidecars to the blobs they describe.
//!
//! A content library keeps one small sidecar per logical file under its
//! metadata directory. Each sidecar names the content hash of the real
//! bytes, which live at `<base>/<blob dir>/<first 4 hash chars>/<hash>`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sharesift_core::{OverlayIdentity, ScanError, WalkConfig, dotted_extension};

static HASH_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Hash=([0-9A-Fa-f]+)").expect("hash field pattern is valid"));

/// Hex characters of the hash that name the shard directory.
const SHARD_LEN: usize = 4;

/// Why a sidecar could not be resolved to content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotResolvable {
    /// The file does not carry the sidecar extension.
    WrongExtension,
    /// The file name is only the sidecar extension.
    MissingName,
    /// The file does not start with the section header.
    MissingHeader,
    /// No hash field was found.
    MissingHash,
    /// The hash is too short to name a shard.
    ShortHash,
}

impl NotResolvable {
    pub fn reason(self) -> &'static str {
        match self {
            Self::WrongExtension => "not a sidecar file",
            Self::MissingName => "sidecar names no file",
            Self::MissingHeader => "does not describe a file",
            Self::MissingHash => "has no content hash",
            Self::ShortHash => "content hash too short",
        }
    }
}

/// A parsed sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectionRecord {
    /// Hex content hash, as written.
    pub hash: String,
}

impl IndirectionRecord {
    /// Parse sidecar text.
    pub fn parse(text: &str, header_marker: &str) -> Result<Self, NotResolvable> {
        if !text.starts_with(header_marker) {
            return Err(NotResolvable::MissingHeader);
        }
        let hash = HASH_FIELD
            .captures(text)
            .and_then(|caps| caps.get(1))
            .ok_or(NotResolvable::MissingHash)?
            .as_str();
        if hash.len() < SHARD_LEN {
            return Err(NotResolvable::ShortHash);
        }
        Ok(Self {
            hash: hash.to_string(),
        })
    }

    /// Shard directory name.
    pub fn shard(&self) -> &str {
        &self.hash[..SHARD_LEN]
    }

    /// Physical path of the blob.
    pub fn content_path(&self, library_base: &Path, blob_dir: &str) -> PathBuf {
        library_base.join(blob_dir).join(self.shard()).join(&self.hash)
    }
}

/// A sidecar resolved to its blob and logical identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    /// Where the bytes live.
    pub content_path: PathBuf,
    /// How the bytes should be named for classification.
    pub overlay: OverlayIdentity,
}

/// Outcome of resolving one file in the metadata tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedContent),
    NotResolvable(NotResolvable),
}

/// Resolve one file found in a library's metadata tree.
///
/// Only reading the sidecar can fail; a file that is readable but not a
/// usable sidecar is reported as [`Resolution::NotResolvable`].
pub fn resolve_sidecar(
    sidecar: &Path,
    library_base: &Path,
    config: &WalkConfig,
) -> Result<Resolution, ScanError> {
    let name = sidecar
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if dotted_extension(&name) != config.sidecar_extension {
        return Ok(Resolution::NotResolvable(NotResolvable::WrongExtension));
    }

    let logical_name = &name[..name.len() - config.sidecar_extension.len()];
    if logical_name.is_empty() {
        return Ok(Resolution::NotResolvable(NotResolvable::MissingName));
    }

    let bytes = std::fs::read(sidecar).map_err(|e| ScanError::io(sidecar, e))?;
    // Sidecars are UTF-8 or BOM-marked UTF-16.
    let (text, _, _) = encoding_rs::UTF_8.decode(&bytes);

    let record = match IndirectionRecord::parse(&text, &config.header_marker) {
        Ok(record) => record,
        Err(reason) => return Ok(Resolution::NotResolvable(reason)),
    };

    let overlay = OverlayIdentity::new(sidecar.with_file_name(logical_name));

    Ok(Resolution::Resolved(ResolvedContent {
        content_path: record.content_path(library_base, &config.blob_dir),
        overlay,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_record() {
        let record = IndirectionRecord::parse("[File]\nSize=10\nHash=ABCD1234EF\n", "[File]").unwrap();
        assert_eq!(record.hash, "ABCD1234EF");
        assert_eq!(record.shard(), "ABCD");
        assert_eq!(
            record.content_path(Path::new("/lib"), "FileLib"),
            PathBuf::from("/lib/FileLib/ABCD/ABCD1234EF")
        );
    }

    #[test]
    fn test_parse_requires_header_at_start() {
        let err = IndirectionRecord::parse("\n[File]\nHash=ABCD1234", "[File]").unwrap_err();
        assert_eq!(err, NotResolvable::MissingHeader);
    }

    #[test]
    fn test_parse_requires_hash() {
        let err = IndirectionRecord::parse("[File]\nSize=10\n", "[File]").unwrap_err();
        assert_eq!(err, NotResolvable::MissingHash);

        let err = IndirectionRecord::parse("[File]\nHash=xyz\n", "[File]").unwrap_err();
        assert_eq!(err, NotResolvable::MissingHash);
    }

    #[test]
    fn test_parse_rejects_short_hash() {
        let err = IndirectionRecord::parse("[File]\nHash=AB\n", "[File]").unwrap_err();
        assert_eq!(err, NotResolvable::ShortHash);
    }

    #[test]
    fn test_resolve_utf16_sidecar() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("SCCMContentLib");
        let pkg = base.join("DataLib");
        fs::create_dir_all(&pkg).unwrap();

        let mut bytes = vec![0xFF, 0xFE];
        for unit in "[File]\r\nHash=BEEF0001\r\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let sidecar = pkg.join("logon.vbs.INI");
        fs::write(&sidecar, &bytes).unwrap();

        let resolution = resolve_sidecar(&sidecar, &base, &WalkConfig::default()).unwrap();
        let Resolution::Resolved(content) = resolution else {
            panic!("expected resolved content");
        };
        assert_eq!(content.content_path, base.join("FileLib").join("BEEF").join("BEEF0001"));
    }

    #[test]
    fn test_resolve_bare_extension_has_no_name() {
        let temp = TempDir::new().unwrap();
        let sidecar = temp.path().join(".INI");
        fs::write(&sidecar, "[File]\nHash=ABCD1234\n").unwrap();

        let resolution = resolve_sidecar(&sidecar, temp.path(), &WalkConfig::default()).unwrap();
        assert_eq!(resolution, Resolution::NotResolvable(NotResolvable::MissingName));
    }

    #[test]
    fn test_resolve_sidecar() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("SCCMContentLib");
        let pkg = base.join("DataLib").join("PKG00001");
        fs::create_dir_all(&pkg).unwrap();
        let sidecar = pkg.join("deploy.ps1.INI");
        fs::write(&sidecar, "[File]\nHash=ABCD1234\n").unwrap();

        let resolution = resolve_sidecar(&sidecar, &base, &WalkConfig::default()).unwrap();
        let Resolution::Resolved(content) = resolution else {
            panic!("expected resolved content");
        };
        assert_eq!(content.content_path, base.join("FileLib").join("ABCD").join("ABCD1234"));
        assert_eq!(content.overlay.name.as_str(), "deploy.ps1");
        assert_eq!(content.overlay.extension.as_str(), ".ps1");
        assert_eq!(content.overlay.full_path, pkg.join("deploy.ps1"));
    }

    #[test]
    fn test_resolve_skips_other_extensions_without_reading() {
        let resolution = resolve_sidecar(
            Path::new("/not/read/notes.txt"),
            Path::new("/lib"),
            &WalkConfig::default(),
        )
        .unwrap();
        assert_eq!(resolution, Resolution::NotResolvable(NotResolvable::WrongExtension));
    }

    #[test]
    fn test_resolve_vanished_sidecar_is_transient() {
        let err = resolve_sidecar(
            Path::new("/not/there/gone.INI"),
            Path::new("/lib"),
            &WalkConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_transient());
    }
}
