//! The file-scan pipeline boundary.

use std::path::Path;

use crate::error::ScanError;
use crate::identity::OverlayIdentity;

/// Inspects one file that the walker discovered or resolved.
///
/// Implementations are shared across worker threads and must not assume any
/// ordering between calls.
pub trait FileScanner: Send + Sync {
    /// Scan the file at `path`. When `overlay` is present, rules see the
    /// overlay's name, path and extension while bytes come from `path`.
    fn scan_file(&self, path: &Path, overlay: Option<&OverlayIdentity>) -> Result<(), ScanError>;
}

impl<T: FileScanner + ?Sized> FileScanner for std::sync::Arc<T> {
    fn scan_file(&self, path: &Path, overlay: Option<&OverlayIdentity>) -> Result<(), ScanError> {
        (**self).scan_file(path, overlay)
    }
}
