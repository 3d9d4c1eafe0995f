//! sharesift - walk file shares and flag files worth a closer look.
//!
//! Usage:
//!   sharesift [ROOTS...]               Walk with the built-in rules
//!   sharesift --rules rules.toml PATH  Walk with a custom rule file
//!   sharesift --format json PATH       Emit findings as JSON
//!   sharesift --help                   Show help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sharesift_classify::{DirectoryGate, FileFinding, RuleScanner, TextClassifier};
use sharesift_core::{ConfigError, RuleSet, WalkConfig};
use sharesift_walk::{Scheduler, TreeWalker, WalkSummary};

#[derive(Parser)]
#[command(
    name = "sharesift",
    version,
    about = "Walk file shares and flag files worth a closer look",
    long_about = "sharesift walks directory trees in parallel, prunes directories \
                  matched by discard rules, resolves content-library metadata to \
                  the files it describes, and reports files matched by rules."
)]
struct Cli {
    /// Directories to walk (defaults to current directory)
    #[arg(default_value = ".")]
    roots: Vec<PathBuf>,

    /// TOML rule file (defaults to the built-in rules)
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Threads scanning files (0 = one per core)
    #[arg(long, default_value = "0")]
    file_threads: usize,

    /// Threads walking directories (0 = one per core)
    #[arg(long, default_value = "0")]
    tree_threads: usize,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not apply directory discard rules inside content libraries
    #[arg(long)]
    no_library_dir_rules: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct Report {
    findings: Vec<FileFinding>,
    summary: WalkSummary,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let rules = match &cli.rules {
        Some(path) => RuleSet::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => RuleSet::builtin().context("Built-in rules are invalid")?,
    };
    info!(
        directory = rules.directory.len(),
        file = rules.file.len(),
        post_match = rules.post_match.len(),
        contents = rules.contents.len(),
        "Rules loaded"
    );
    let rules = Arc::new(rules);

    let config = WalkConfig::builder()
        .file_threads(cli.file_threads)
        .tree_threads(cli.tree_threads)
        .apply_dir_rules_in_library(!cli.no_library_dir_rules)
        .build()
        .map_err(ConfigError::from)
        .context("Invalid walk configuration")?;

    let report = run_walk(&cli.roots, rules, config)?;

    match cli.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

/// Install the stderr subscriber; `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level {level:?}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

/// Walk every root and collect findings once both pools have drained.
fn run_walk(roots: &[PathBuf], rules: Arc<RuleSet>, config: WalkConfig) -> Result<Report> {
    let scheduler = Scheduler::from_config(&config).context("Failed to start work pools")?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let scanner = RuleScanner::new(rules.clone(), tx).with_max_content_bytes(config.max_content_bytes);
    let gate = DirectoryGate::new(rules, Arc::new(TextClassifier::new()));
    let walker = TreeWalker::new(config, gate, Arc::new(scanner), &scheduler);

    for root in roots {
        if !root.is_dir() {
            warn!(root = %root.display(), "Scan root is not a directory");
        }
        walker.walk(root.clone()).context("Walk was refused")?;
    }
    scheduler.wait_idle();

    // Every job has finished, so every finding is already queued.
    let mut findings = Vec::new();
    while let Ok(finding) = rx.try_recv() {
        findings.push(finding);
    }
    findings.sort_by(|a, b| {
        a.triage
            .cmp(&b.triage)
            .then_with(|| a.identity.full_path().cmp(b.identity.full_path()))
    });

    Ok(Report {
        findings,
        summary: walker.summary(),
    })
}

fn print_text(report: &Report) {
    for finding in &report.findings {
        let identity = &finding.identity;
        let matched = finding
            .matched
            .as_ref()
            .map(|m| format!(" matched {:?}", m.matched))
            .unwrap_or_default();
        println!(
            "[{}] {} {} ({}){}",
            finding.triage,
            finding.rule,
            identity.full_path().display(),
            format_size(identity.length()),
            matched
        );
        if identity.is_overlay() {
            println!("    content: {}", identity.physical_path().display());
        }
    }

    let summary = &report.summary;
    println!();
    println!("{}", "─".repeat(60));
    println!(" {} finding(s)", report.findings.len());
    println!(
        " {} directories walked, {} skipped by rules",
        summary.dirs_walked, summary.dirs_skipped
    );
    println!(
        " {} files scanned, {} library records resolved, {} unresolved",
        summary.files_dispatched, summary.records_resolved, summary.records_skipped
    );
    if summary.errors_count > 0 {
        println!(" {} error(s) during walk", summary.errors_count);
    }
    println!(
        " Walked in {:.2}s ({:.0} files/s)",
        summary.elapsed.as_secs_f64(),
        summary.files_per_second()
    );
    println!("{}", "─".repeat(60));
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
