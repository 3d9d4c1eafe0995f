//! Recursive directory walker that dispatches work to the pools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sharesift_classify::DirectoryGate;
use sharesift_core::{FileScanner, OverlayIdentity, ScanError, WalkConfig};
use tracing::{debug, error, info, trace};

use crate::library::{Resolution, resolve_sidecar};
use crate::pool::{PoolError, Scheduler, TaskPool};
use crate::progress::{WalkStats, WalkSummary};

/// Which entries an enumeration step collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

struct WalkerInner {
    config: WalkConfig,
    gate: DirectoryGate,
    scanner: Arc<dyn FileScanner>,
    file_pool: Arc<dyn TaskPool>,
    tree_pool: Arc<dyn TaskPool>,
    stats: WalkStats,
}

/// Walks directory trees, sending files to the file pool and every
/// subdirectory to the tree pool as its own job.
///
/// Cloning is cheap; clones share configuration, pools and statistics.
#[derive(Clone)]
pub struct TreeWalker {
    inner: Arc<WalkerInner>,
}

impl TreeWalker {
    /// Create a walker running on a scheduler's pools.
    pub fn new(
        config: WalkConfig,
        gate: DirectoryGate,
        scanner: Arc<dyn FileScanner>,
        scheduler: &Scheduler,
    ) -> Self {
        Self::with_pools(
            config,
            gate,
            scanner,
            scheduler.files.clone(),
            scheduler.trees.clone(),
        )
    }

    /// Create a walker on arbitrary pools.
    pub fn with_pools(
        config: WalkConfig,
        gate: DirectoryGate,
        scanner: Arc<dyn FileScanner>,
        file_pool: Arc<dyn TaskPool>,
        tree_pool: Arc<dyn TaskPool>,
    ) -> Self {
        Self {
            inner: Arc::new(WalkerInner {
                config,
                gate,
                scanner,
                file_pool,
                tree_pool,
                stats: WalkStats::new(),
            }),
        }
    }

    /// Start walking a scan root.
    ///
    /// The root is walked as a directory job; this returns as soon as the
    /// job is queued.
    pub fn walk(&self, root: impl Into<PathBuf>) -> Result<(), PoolError> {
        let root = root.into();
        info!(root = %root.display(), "Walking scan root");
        self.submit_tree(root, |walker, dir| walker.walk_tree(dir))
    }

    /// Counters for everything walked so far.
    pub fn summary(&self) -> WalkSummary {
        self.inner.stats.snapshot()
    }

    /// Process one directory: dispatch its files and gate its subdirectories.
    ///
    /// A path that no longer exists or is not a directory is ignored.
    pub fn walk_tree(&self, dir: &Path) {
        if !dir.is_dir() {
            return;
        }

        if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
            if self.inner.config.is_library_name(name) {
                self.enter_library(dir);
                return;
            }
        }

        self.inner.stats.record_dir();

        if let Some(files) = self.enumerate(dir, EntryKind::File) {
            for file in files {
                let submitted = self.submit_file(file.clone(), move |walker| {
                    walker.scan(&file, None);
                });
                if submitted.is_err() {
                    break;
                }
                self.inner.stats.record_file();
            }
        }

        if let Some(subdirs) = self.enumerate(dir, EntryKind::Dir) {
            for subdir in subdirs {
                if !self.inner.gate.should_scan(&subdir) {
                    trace!(path = %subdir.display(), "Skipped scanning due to discard rule match");
                    self.inner.stats.record_skipped_dir();
                    continue;
                }
                if self
                    .submit_tree(subdir, |walker, dir| walker.walk_tree(dir))
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    /// Process one directory of a content library's metadata tree.
    ///
    /// Files are resolved to their blobs before being scanned; subdirectories
    /// stay in library mode.
    pub fn walk_library(&self, dir: &Path, library_base: &Path) {
        if !dir.is_dir() {
            return;
        }

        self.inner.stats.record_dir();

        if let Some(files) = self.enumerate(dir, EntryKind::File) {
            for sidecar in files {
                let base = library_base.to_path_buf();
                let submitted = self.submit_file(sidecar.clone(), move |walker| {
                    walker.resolve_and_dispatch(&sidecar, &base);
                });
                if submitted.is_err() {
                    break;
                }
            }
        }

        if let Some(subdirs) = self.enumerate(dir, EntryKind::Dir) {
            for subdir in subdirs {
                if self.inner.config.apply_dir_rules_in_library
                    && !self.inner.gate.should_scan(&subdir)
                {
                    trace!(path = %subdir.display(), "Skipped scanning due to discard rule match");
                    self.inner.stats.record_skipped_dir();
                    continue;
                }
                let base = library_base.to_path_buf();
                if self
                    .submit_tree(subdir, move |walker, dir| walker.walk_library(dir, &base))
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    fn enter_library(&self, library_base: &Path) {
        info!(path = %library_base.display(), "Content library found");

        let metadata = library_base.join(&self.inner.config.metadata_dir);
        if !metadata.is_dir() {
            error!(
                path = %metadata.display(),
                "Content library found but its metadata directory is missing"
            );
            self.inner.stats.record_error();
            return;
        }

        info!(path = %metadata.display(), "Entering content library metadata");
        self.walk_library(&metadata, library_base);
    }

    fn resolve_and_dispatch(&self, sidecar: &Path, library_base: &Path) {
        match resolve_sidecar(sidecar, library_base, &self.inner.config) {
            Ok(Resolution::Resolved(content)) => {
                trace!(
                    content = %content.content_path.display(),
                    sidecar = %sidecar.display(),
                    logical = %content.overlay.full_path.display(),
                    "Resolved library content"
                );
                self.inner.stats.record_resolved();
                let path = content.content_path.clone();
                let submitted = self.submit_file(path, move |walker| {
                    walker.scan(&content.content_path, Some(&content.overlay));
                });
                if submitted.is_ok() {
                    self.inner.stats.record_file();
                }
            }
            Ok(Resolution::NotResolvable(reason)) => {
                trace!(path = %sidecar.display(), reason = reason.reason(), "Skipping library file");
                self.inner.stats.record_unresolved();
            }
            Err(e) => {
                trace!(path = %sidecar.display(), error = %e, "Could not read library file");
                self.inner.stats.record_error();
            }
        }
    }

    fn scan(&self, path: &Path, overlay: Option<&OverlayIdentity>) {
        match self.inner.scanner.scan_file(path, overlay) {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                trace!(path = %path.display(), error = %e, "File vanished or was denied");
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "File scan failed");
                self.inner.stats.record_error();
            }
        }
    }

    /// List the files or subdirectories of `dir`, sorted by path.
    ///
    /// Returns `None` if the directory could not be read; the failure ends
    /// only this step. Entries that fail individually are skipped.
    fn enumerate(&self, dir: &Path, kind: EntryKind) -> Option<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                let err = ScanError::io(dir, e);
                if err.is_transient() {
                    trace!(path = %dir.display(), ?kind, error = %err, "Enumeration failed");
                } else {
                    debug!(path = %dir.display(), ?kind, error = %err, "Enumeration failed");
                }
                self.inner.stats.record_error();
                return None;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    trace!(path = %dir.display(), error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry_kind(entry, self.inner.config.follow_dir_links) == Some(kind))
            .map(|entry| entry.path())
            .collect();
        paths.sort();
        Some(paths)
    }

    fn submit_file<F>(&self, path: PathBuf, work: F) -> Result<(), PoolError>
    where
        F: FnOnce(&TreeWalker) + Send + 'static,
    {
        let walker = self.clone();
        self.inner
            .file_pool
            .submit(Box::new(move || work(&walker)))
            .inspect_err(|e| debug!(path = %path.display(), error = %e, "File job refused"))
    }

    fn submit_tree<F>(&self, dir: PathBuf, work: F) -> Result<(), PoolError>
    where
        F: FnOnce(&TreeWalker, &Path) + Send + 'static,
    {
        let walker = self.clone();
        let job_dir = dir.clone();
        self.inner
            .tree_pool
            .submit(Box::new(move || work(&walker, &job_dir)))
            .inspect_err(|e| debug!(path = %dir.display(), error = %e, "Directory job refused"))
    }
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("config", &self.inner.config)
            .field("gate", &self.inner.gate)
            .field("stats", &self.inner.stats)
            .finish_non_exhaustive()
    }
}

/// Classify a directory entry.
///
/// A link to a file counts as a file. A link to a directory counts as a
/// directory only when `follow_dir_links` is set.
fn entry_kind(entry: &std::fs::DirEntry, follow_dir_links: bool) -> Option<EntryKind> {
    let file_type = entry.file_type().ok()?;
    if file_type.is_dir() {
        return Some(EntryKind::Dir);
    }
    if file_type.is_file() {
        return Some(EntryKind::File);
    }
    if file_type.is_symlink() {
        return match std::fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => Some(EntryKind::File),
            Ok(meta) if meta.is_dir() && follow_dir_links => Some(EntryKind::Dir),
            Ok(meta) if meta.is_dir() => {
                trace!(path = %entry.path().display(), "Not following directory link");
                None
            }
            Ok(_) => None,
            Err(e) => {
                trace!(path = %entry.path().display(), error = %e, "Dangling link");
                None
            }
        };
    }
    None
}
