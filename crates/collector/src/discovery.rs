//! Test-result discovery.
//!
//! Two independent passes:
//!
//! - a reference scan that lists up to [`MAX_REFERENCE_FILES`] result-looking files in the
//!   repository, for the agent to open on demand;
//! - an explicit copy of the files matched by the caller's glob patterns into
//!   `test-outputs/`, whose contents are inlined into the context document.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub const MAX_REFERENCE_FILES: usize = 10;

const RESULT_EXTENSIONS: &[&str] = &["xml", "json", "log", "tap", "trx"];
const RESULT_KEYWORDS: &[&str] = &["test", "spec", "junit", "report", "result"];

/// Package-manager caches that routinely contain third-party test reports.
pub const DEPENDENCY_CACHE_DIRS: &[&str] = &[
    "node_modules",
    ".venv",
    "venv",
    "site-packages",
    "bower_components",
    ".gradle",
    ".m2",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Sanitized names now present in `test-outputs/`, sorted.
    pub copied: Vec<String>,
    pub skipped: usize,
}

/// Lists result-looking files under `root` as sorted `./relative/path` strings.
pub fn scan_reference_files(root: &Path, workdir: &Path) -> Vec<String> {
    let skip_dir = fs::canonicalize(workdir).ok();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry, skip_dir.as_deref()));

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_result_extension(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let lowered = relative.to_ascii_lowercase();
        if RESULT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            found.push(format!("./{relative}"));
        }
    }

    found.sort();
    found.truncate(MAX_REFERENCE_FILES);
    log::debug!("Reference scan found {} test files", found.len());
    found
}

fn is_excluded_dir(entry: &DirEntry, workdir: Option<&Path>) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name();
    if name == OsStr::new(".git") || is_cache_dir(name) {
        return true;
    }
    match workdir {
        Some(workdir) => fs::canonicalize(entry.path()).is_ok_and(|path| path == workdir),
        None => false,
    }
}

fn is_cache_dir(name: &OsStr) -> bool {
    DEPENDENCY_CACHE_DIRS
        .iter()
        .any(|cache| name == OsStr::new(cache))
}

fn has_result_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| RESULT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn in_dependency_cache(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => is_cache_dir(name),
        _ => false,
    })
}

/// Flattens a relative path into one file name: `./a/b\c.xml` becomes `a_b_c.xml`.
pub fn sanitize_name(path: &str) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.replace(['/', '\\'], "_")
        .trim_start_matches('_')
        .to_string()
}

/// Expands whitespace-separated glob patterns relative to `root`. Matches are
/// returned in pattern order, each pattern's matches sorted.
pub fn expand_patterns(root: &Path, patterns: &str) -> Vec<PathBuf> {
    let mut matches = Vec::new();
    for pattern in patterns.split_whitespace() {
        let anchored = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            root.join(pattern)
        };
        let anchored = anchored.to_string_lossy().into_owned();
        match glob::glob(&anchored) {
            Ok(paths) => {
                let mut expanded: Vec<PathBuf> = paths
                    .filter_map(|entry| match entry {
                        Ok(path) => Some(path),
                        Err(err) => {
                            log::warn!("Skipping unreadable match for {pattern}: {err}");
                            None
                        }
                    })
                    .collect();
                if expanded.is_empty() {
                    log::info!("No test results matched {pattern}");
                }
                expanded.sort();
                matches.extend(expanded);
            }
            Err(err) => log::warn!("Invalid test results pattern {pattern}: {err}"),
        }
    }
    matches
}

/// Removes the staging directory unless the swap completed.
struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn create(path: PathBuf) -> std::io::Result<Self> {
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path, armed: true })
    }

    /// Moves the previous `target` aside, swaps the staging dir in, and only then
    /// deletes the old contents. A failed swap restores the previous directory.
    fn commit(mut self, target: &Path) -> std::io::Result<()> {
        let aside = aside_path(target);
        if aside.exists() {
            fs::remove_dir_all(&aside)?;
        }
        let had_previous = target.exists();
        if had_previous {
            fs::rename(target, &aside)?;
        }
        if let Err(err) = fs::rename(&self.path, target) {
            if had_previous {
                if let Err(restore) = fs::rename(&aside, target) {
                    log::warn!("Failed to restore {}: {restore}", target.display());
                }
            }
            return Err(err);
        }
        self.armed = false;
        if had_previous {
            if let Err(err) = fs::remove_dir_all(&aside) {
                log::warn!("Failed to remove {}: {err}", aside.display());
            }
        }
        Ok(())
    }
}

fn aside_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".previous");
    target.with_file_name(name)
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Copies every file matched by `patterns` into `target`, replacing its
/// previous contents in one rename. Matches inside `workdir`, `staging` or
/// `target` are the pipeline's own artifacts and are never copied.
pub fn copy_test_outputs(
    root: &Path,
    patterns: Option<&str>,
    workdir: &Path,
    staging: &Path,
    target: &Path,
) -> std::io::Result<CopyReport> {
    let guard = StagingGuard::create(staging.to_path_buf())?;
    let owned: Vec<PathBuf> = [workdir, staging, target]
        .iter()
        .filter_map(|dir| fs::canonicalize(dir).ok())
        .collect();
    let mut report = CopyReport::default();
    let mut seen_sources = HashSet::new();
    let mut seen_names = HashSet::new();

    for source in patterns
        .map(|patterns| expand_patterns(root, patterns))
        .unwrap_or_default()
    {
        if !source.is_file() {
            continue;
        }
        let identity = fs::canonicalize(&source).unwrap_or_else(|_| source.clone());
        if owned.iter().any(|dir| identity.starts_with(dir)) {
            log::debug!("Skipping working directory file {}", source.display());
            continue;
        }
        let relative = source.strip_prefix(root).unwrap_or(&source);
        if in_dependency_cache(relative) {
            log::debug!("Skipping dependency cache file {}", source.display());
            report.skipped += 1;
            continue;
        }
        if !seen_sources.insert(identity) {
            continue;
        }
        let name = sanitize_name(&relative.to_string_lossy());
        if name.is_empty() || !seen_names.insert(name.clone()) {
            log::warn!("Skipping {}: name {name:?} already taken", source.display());
            report.skipped += 1;
            continue;
        }
        match fs::copy(&source, staging.join(&name)) {
            Ok(_) => report.copied.push(name),
            Err(err) => {
                log::warn!("Failed to copy {}: {err}", source.display());
                report.skipped += 1;
            }
        }
    }

    guard.commit(target)?;
    report.copied.sort();
    Ok(report)
}
