//! Logical file identities handed to the classifiers.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Get the dotted extension of a file name, e.g. `.txt` for `notes.txt`.
///
/// Returns an empty string when the name has no extension or ends in a dot.
/// Leading-dot names such as `.bashrc` are treated as all extension.
pub fn dotted_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => &name[idx..],
        _ => "",
    }
}

fn file_name_of(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_default()
}

/// A logical name substituted for a physically different file.
///
/// The bytes scanned still come from the physical path; the overlay only
/// changes what the rules see as name, path and extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayIdentity {
    /// Logical full path.
    pub full_path: PathBuf,
    /// Logical base name.
    pub name: CompactString,
    /// Logical dotted extension (empty if none).
    pub extension: CompactString,
}

impl OverlayIdentity {
    /// Create an overlay identity from a logical full path.
    pub fn new(full_path: impl Into<PathBuf>) -> Self {
        let full_path = full_path.into();
        let name = file_name_of(&full_path);
        let extension = CompactString::new(dotted_extension(&name));
        Self {
            full_path,
            name,
            extension,
        }
    }
}

/// The identity a downstream consumer classifies.
///
/// Exactly one of the real entry or an overlay backs a scan unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileIdentity {
    /// The filesystem entry itself.
    Real {
        path: PathBuf,
        name: CompactString,
        extension: CompactString,
        length: u64,
    },
    /// A logical identity whose bytes live at `physical`.
    Overlay {
        overlay: OverlayIdentity,
        physical: PathBuf,
        length: u64,
    },
}

impl FileIdentity {
    /// Identity of a real file with a known length.
    pub fn real(path: impl Into<PathBuf>, length: u64) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        let extension = CompactString::new(dotted_extension(&name));
        Self::Real {
            path,
            name,
            extension,
            length,
        }
    }

    /// Identity of physical bytes named by an overlay.
    pub fn overlay(overlay: OverlayIdentity, physical: impl Into<PathBuf>, length: u64) -> Self {
        Self::Overlay {
            overlay,
            physical: physical.into(),
            length,
        }
    }

    /// Build an identity by reading the physical file's metadata.
    pub fn from_path(path: &Path, overlay: Option<&OverlayIdentity>) -> std::io::Result<Self> {
        let length = std::fs::metadata(path)?.len();
        Ok(match overlay {
            Some(overlay) => Self::overlay(overlay.clone(), path, length),
            None => Self::real(path, length),
        })
    }

    /// Base name used for classification.
    pub fn name(&self) -> &str {
        match self {
            Self::Real { name, .. } => name,
            Self::Overlay { overlay, .. } => &overlay.name,
        }
    }

    /// Full path used for classification.
    pub fn full_path(&self) -> &Path {
        match self {
            Self::Real { path, .. } => path,
            Self::Overlay { overlay, .. } => &overlay.full_path,
        }
    }

    /// Dotted extension used for classification.
    pub fn extension(&self) -> &str {
        match self {
            Self::Real { extension, .. } => extension,
            Self::Overlay { overlay, .. } => &overlay.extension,
        }
    }

    /// Byte length of the physical file.
    pub fn length(&self) -> u64 {
        match self {
            Self::Real { length, .. } | Self::Overlay { length, .. } => *length,
        }
    }

    /// Where the bytes are actually read from.
    pub fn physical_path(&self) -> &Path {
        match self {
            Self::Real { path, .. } => path,
            Self::Overlay { physical, .. } => physical,
        }
    }

    /// Check if this identity is an overlay.
    pub fn is_overlay(&self) -> bool {
        matches!(self, Self::Overlay { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension("report.kdbx.bak"), ".bak");
        assert_eq!(dotted_extension("README"), "");
        assert_eq!(dotted_extension("trailing."), "");
        assert_eq!(dotted_extension(".bashrc"), ".bashrc");
    }

    #[test]
    fn test_overlay_changes_name_not_bytes() {
        let overlay = OverlayIdentity::new("/lib/DataLib/pkg/passwords.xlsx");
        let identity = FileIdentity::overlay(overlay, "/lib/FileLib/ABCD/ABCD1234", 10);

        assert_eq!(identity.name(), "passwords.xlsx");
        assert_eq!(identity.extension(), ".xlsx");
        assert_eq!(identity.full_path(), Path::new("/lib/DataLib/pkg/passwords.xlsx"));
        assert_eq!(identity.physical_path(), Path::new("/lib/FileLib/ABCD/ABCD1234"));
        assert!(identity.is_overlay());
    }
}
