//! Walking engine for sharesift.
//!
//! This crate walks directory trees on two independent work pools and hands
//! every file it finds to a [`FileScanner`].
//!
//! # Overview
//!
//! - **Parallel traversal** - each subdirectory is its own job on the tree pool
//! - **Directory gating** - discard rules prune whole subtrees before recursion
//! - **Content libraries** - sidecar metadata is resolved to hashed blobs and
//!   scanned under its logical name
//! - **Backpressure** - submitters block while a pool's backlog is full
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sharesift_classify::{DirectoryGate, RuleScanner, TextClassifier};
//! use sharesift_core::{RuleSet, WalkConfig};
//! use sharesift_walk::{Scheduler, TreeWalker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WalkConfig::default();
//! let rules = Arc::new(RuleSet::builtin()?);
//! let scheduler = Scheduler::from_config(&config)?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let scanner = Arc::new(RuleScanner::new(rules.clone(), tx));
//! let gate = DirectoryGate::new(rules, Arc::new(TextClassifier::new()));
//!
//! let walker = TreeWalker::new(config, gate, scanner, &scheduler);
//! walker.walk("/mnt/share")?;
//! scheduler.wait_idle();
//!
//! while let Ok(finding) = rx.try_recv() {
//!     println!("{} {}", finding.rule, finding.identity.full_path().display());
//! }
//! # Ok(())
//! # }
//! ```

mod library;
mod pool;
mod progress;
mod walker;

pub use library::{
    IndirectionRecord, NotResolvable, Resolution, ResolvedContent, resolve_sidecar,
};
pub use pool::{Job, PoolError, Scheduler, TaskPool, WorkPool};
pub use progress::{WalkStats, WalkSummary};
pub use walker::TreeWalker;

// Re-export core types for convenience
pub use sharesift_core::{FileScanner, OverlayIdentity, ScanError, WalkConfig};
