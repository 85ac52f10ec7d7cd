//! Parallel, gitignore-aware source discovery using the `ignore` crate.
//!
//! Produces the ordered input sequence of a run: files filtered by the
//! extension allow-list, exclude globs and the size limit, sorted by path.
//!
//! - Native `.gitignore` support at all levels
//! - Custom `.strataignore` file support
//! - xxh3 content hashes for diffable file summaries

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::ScanError;

/// Language label from file extension.
fn detect_language(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "java" => "java",
        "xml" => "xml",
        "properties" => "properties",
        "yaml" | "yml" => "yaml",
        "gradle" | "kts" => "gradle",
        "json" => "json",
        "sql" => "sql",
        _ => "other",
    }
}

/// Filters applied while walking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Extensions to include, without the dot.
    pub extensions: Vec<String>,
    /// Glob patterns to exclude, relative to the root.
    pub exclude: Vec<String>,
    /// Files larger than this are skipped. `0` disables the limit.
    pub max_file_size_kb: u64,
    pub follow_symlinks: bool,
    pub compute_hashes: bool,
    pub count_lines: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["java".to_string()],
            exclude: Vec::new(),
            max_file_size_kb: 512,
            follow_symlinks: false,
            compute_hashes: true,
            count_lines: true,
        }
    }
}

/// Information about a scanned file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
    /// Relative path from scan root, `/`-separated.
    pub path: String,
    pub language: String,
    pub size_bytes: u64,
    /// `xxh3:` prefixed content hash, when requested.
    pub hash: Option<String>,
    pub lines: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    TooLarge,
    Unreadable,
}

/// A candidate file that passed the extension filter but was not kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
    pub size_bytes: u64,
}

/// Result of scanning a directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Kept files, sorted by path.
    pub files: Vec<ScannedFile>,
    /// Files dropped by the size limit or unreadable, sorted by path.
    pub skipped: Vec<SkippedFile>,
    /// Files outside the extension allow-list.
    pub filtered_count: usize,
    pub duration_ms: f64,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Compute xxHash3 hash of file content.
fn compute_file_hash(content: &[u8]) -> String {
    format!("xxh3:{:016x}", xxh3_64(content))
}

/// Count lines in a buffer efficiently.
fn count_lines(content: &[u8]) -> u32 {
    let newlines = bytecount::count(content, b'\n');
    let trailing = usize::from(!content.is_empty() && !content.ends_with(b"\n"));
    (newlines + trailing) as u32
}

/// Scan a directory for source files.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<ScanResult, ScanError> {
    let start = Instant::now();

    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.display().to_string()));
    }

    let extensions: HashSet<String> = options
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false) // let gitignore decide
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .follow_links(options.follow_symlinks)
        .add_custom_ignore_filename(".strataignore");

    if !options.exclude.is_empty() {
        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &options.exclude {
            // `!` turns a whitelist override into an ignore rule
            override_builder
                .add(&format!("!{}", pattern))
                .map_err(|e| ScanError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }
        let overrides = override_builder.build().map_err(|e| ScanError::InvalidPattern {
            pattern: options.exclude.join(", "),
            message: e.to_string(),
        })?;
        builder.overrides(overrides);
    }

    let candidates: Vec<_> = builder
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect();

    let filtered = AtomicUsize::new(0);
    let kept = Mutex::new(Vec::new());
    let skipped = Mutex::new(Vec::new());
    let max_bytes = options.max_file_size_kb.saturating_mul(1024);

    candidates.par_iter().for_each(|path| {
        let allowed = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e.to_lowercase()))
            .unwrap_or(false);
        if !allowed {
            filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let rel_path = relative_path(root, path);
        let size_bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if max_bytes > 0 && size_bytes > max_bytes {
            tracing::debug!(path = %rel_path, size_bytes, "Skipping oversized file");
            push_locked(&skipped, SkippedFile { path: rel_path, reason: SkipReason::TooLarge, size_bytes });
            return;
        }

        let (hash, lines) = if options.compute_hashes || options.count_lines {
            match fs::read(path) {
                Ok(content) => (
                    options.compute_hashes.then(|| compute_file_hash(&content)),
                    if options.count_lines { count_lines(&content) } else { 0 },
                ),
                Err(e) => {
                    tracing::warn!(path = %rel_path, "Unreadable file: {}", e);
                    push_locked(&skipped, SkippedFile { path: rel_path, reason: SkipReason::Unreadable, size_bytes });
                    return;
                }
            }
        } else {
            (None, 0)
        };

        push_locked(
            &kept,
            ScannedFile {
                language: detect_language(path).to_string(),
                path: rel_path,
                size_bytes,
                hash,
                lines,
            },
        );
    });

    let mut files: Vec<ScannedFile> = kept.into_inner().unwrap_or_else(|p| p.into_inner());
    let mut skipped: Vec<SkippedFile> = skipped.into_inner().unwrap_or_else(|p| p.into_inner());
    files.sort_by(|a, b| a.path.cmp(&b.path));
    skipped.sort_by(|a, b| a.path.cmp(&b.path));

    let result = ScanResult {
        files,
        skipped,
        filtered_count: filtered.load(Ordering::Relaxed),
        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    tracing::info!(
        files = result.files.len(),
        skipped = result.skipped.len(),
        duration_ms = result.duration_ms,
        "Scan complete"
    );
    Ok(result)
}

fn push_locked<T>(target: &Mutex<Vec<T>>, item: T) {
    match target.lock() {
        Ok(mut guard) => guard.push(item),
        Err(poisoned) => {
            tracing::warn!("Scanner mutex was poisoned, recovering");
            poisoned.into_inner().push(item)
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
