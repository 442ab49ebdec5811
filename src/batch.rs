//! Batch runner: apply one patch set across a preset library.
//!
//! One corrupt or unwritable file never aborts the run; its failure is
//! recorded and every other file is still processed. Output is either
//! written in place (optionally with a `.bak` copy) or mirrored under an
//! output root, preserving the relative directory structure.

use crate::codec::{Container, ContainerKind, FormatError, DEFAULT_PAYLOAD_KEY};
use crate::patch::{apply, ApplyError, OperationOutcome, PatchSet};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Filename glob, `*` and `?` wildcards only (e.g. `*.adg`)
    pub pattern: String,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Directory names skipped entirely (the original libraries keep a
    /// `Backup` folder of pristine presets next to the working set)
    pub exclude_dirs: Vec<String>,
    pub output: OutputMode,
    /// Report without writing anything
    pub dry_run: bool,
    /// Container kind override; inferred per file when absent
    pub kind: Option<ContainerKind>,
    /// plist payload key (`data0`, `data1`, ...)
    pub payload_key: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            pattern: "*.adg".to_string(),
            recursive: true,
            exclude_dirs: vec!["Backup".to_string()],
            output: OutputMode::InPlace { backup: false },
            dry_run: false,
            kind: None,
            payload_key: DEFAULT_PAYLOAD_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Overwrite each input, optionally copying `<name>.bak` first
    InPlace { backup: bool },
    /// Mirror each input's relative subpath under this root
    Mirror { root: PathBuf },
}

/// Per-file result of a batch run.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    pub operations: Vec<(String, OperationOutcome)>,
}

#[derive(Debug)]
pub enum FileStatus {
    /// At least one operation applied; output written (or would be, in dry-run)
    Patched { output: PathBuf },
    /// Every operation was not-found or already applied; nothing written
    Unchanged,
    /// Decode, apply, or write failed for this file
    Failed { reason: String },
}

/// Accumulated batch summary.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: Vec<FileOutcome>,
}

impl BatchReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Patched { .. } => self.processed += 1,
            FileStatus::Unchanged => self.skipped += 1,
            FileStatus::Failed { .. } => self.errors += 1,
        }
        self.details.push(outcome);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("invalid file pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

#[derive(Error, Debug)]
enum FileError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("failed to create backup {path}: {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run the patch set against every matching file under `root`.
pub fn run(root: &Path, patches: &PatchSet, options: &BatchOptions) -> Result<BatchReport, BatchError> {
    let matcher = glob_regex(&options.pattern).map_err(|source| BatchError::Pattern {
        pattern: options.pattern.clone(),
        source,
    })?;

    let mut report = BatchReport::default();

    let mut walker = WalkDir::new(root).sort_by_file_name();
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    let entries = walker.into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && options
                    .exclude_dirs
                    .iter()
                    .any(|dir| entry.file_name() == dir.as_str()))
    });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                report.record(FileOutcome {
                    path,
                    status: FileStatus::Failed {
                        reason: err.to_string(),
                    },
                    operations: Vec::new(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if !matcher.is_match(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let path = entry.path().to_path_buf();
        match process_file(root, &path, patches, options) {
            Ok(outcome) => report.record(outcome),
            Err(err) => report.record(FileOutcome {
                path,
                status: FileStatus::Failed {
                    reason: err.to_string(),
                },
                operations: Vec::new(),
            }),
        }
    }

    Ok(report)
}

fn process_file(
    root: &Path,
    path: &Path,
    patches: &PatchSet,
    options: &BatchOptions,
) -> Result<FileOutcome, FileError> {
    let container = Container::open(path, options.kind, &options.payload_key)?;
    let payload = container.payload()?;
    let (modified, operations) = apply(&payload, &patches.patches)?;

    let changed = operations
        .iter()
        .any(|(_, outcome)| matches!(outcome, OperationOutcome::Applied { .. }));
    if !changed {
        return Ok(FileOutcome {
            path: path.to_path_buf(),
            status: FileStatus::Unchanged,
            operations,
        });
    }

    let output = match &options.output {
        OutputMode::InPlace { .. } => path.to_path_buf(),
        OutputMode::Mirror { root: out_root } => {
            let relative = path.strip_prefix(root).unwrap_or(path);
            out_root.join(relative)
        }
    };

    if !options.dry_run {
        if let OutputMode::InPlace { backup: true } = options.output {
            let backup = backup_path(path);
            fs::copy(path, &backup).map_err(|source| FileError::Backup {
                path: backup.clone(),
                source,
            })?;
        }

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| FileError::OutputDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        container.write_with_payload(&modified, &output)?;
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        status: FileStatus::Patched { output },
        operations,
    })
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Translate a `*`/`?` filename glob into an anchored case-insensitive regex.
fn glob_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated)
}
