//! Scanner: concurrent file discovery and parsing into [`FileStructure`]
//! values, with VCS metadata attached (spec §4.1-§4.3).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use regex::Regex;
use tracing::debug;

use crate::errors::ProcessingError;
use crate::manifest::{FolderManifest, ManifestSet};
use crate::model::FileStructure;
use crate::parser::{self, MAX_FILE_SIZE};
use crate::vcs::VcsAdapter;
use crate::walker::{self, WalkError};

const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["rs", "go", "py", "ts", "js", "java", "c", "h", "cpp", "hpp"];
const DEFAULT_WORKER_COUNT: usize = 32;
const DEFAULT_ERROR_QUEUE_CAPACITY: usize = 256;

/// Options controlling a scan run (the external surface of spec §6's flags).
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub source_extensions: Vec<String>,
    pub ignore_line_patterns: Vec<Regex>,
    pub worker_count: usize,
    pub error_queue_capacity: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            source_extensions: DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_line_patterns: Vec::new(),
            worker_count: DEFAULT_WORKER_COUNT,
            error_queue_capacity: DEFAULT_ERROR_QUEUE_CAPACITY,
        }
    }
}

/// The scanner's full output: parsed files, collected semantic errors,
/// I/O-level walk errors, and any pre-existing per-folder manifests read
/// from disk (needed by the analyzer to resolve unchanged coverers' hashes).
pub struct ScanResult {
    pub files: Vec<FileStructure>,
    pub errors: Vec<ProcessingError>,
    pub walk_errors: Vec<WalkError>,
    pub existing_manifests: ManifestSet,
    pub skipped_oversized: usize,
}

struct Accumulator {
    files: Vec<FileStructure>,
    errors: Vec<ProcessingError>,
    existing_manifests: ManifestSet,
    skipped_oversized: usize,
}

/// Scan `roots` for Markdown and source files, classify, parse, and attach
/// VCS metadata to each. See spec §4.1/§4.2/§5.
pub fn scan(roots: &[PathBuf], options: &ScanOptions, vcs: &dyn VcsAdapter) -> ScanResult {
    let accumulator = Mutex::new(Accumulator {
        files: Vec::new(),
        errors: Vec::new(),
        existing_manifests: ManifestSet::new(),
        skipped_oversized: 0,
    });
    let seen_manifest_dirs: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());

    let extensions: HashSet<&str> = options.source_extensions.iter().map(|s| s.as_str()).collect();

    let folder_processor = |dir: &Path| -> bool {
        let mut seen = seen_manifest_dirs.lock().unwrap();
        if seen.insert(dir.to_path_buf()) {
            if let Ok(Some(manifest)) = FolderManifest::read_existing(dir) {
                accumulator
                    .lock()
                    .unwrap()
                    .existing_manifests
                    .insert(dir.to_path_buf(), manifest);
            }
        }
        true
    };

    let file_processor = |path: &Path| -> Result<(), String> {
        process_one_file(path, &extensions, options, vcs, &accumulator)
    };

    let walk_errors = walker::walk(
        roots,
        options.worker_count,
        options.error_queue_capacity,
        folder_processor,
        file_processor,
    );

    let acc = accumulator.into_inner().unwrap();
    debug!(files = acc.files.len(), errors = acc.errors.len(), "scan complete");
    ScanResult {
        files: acc.files,
        errors: acc.errors,
        walk_errors,
        existing_manifests: acc.existing_manifests,
        skipped_oversized: acc.skipped_oversized,
    }
}

fn process_one_file(
    path: &Path,
    extensions: &HashSet<&str>,
    options: &ScanOptions,
    vcs: &dyn VcsAdapter,
    accumulator: &Mutex<Accumulator>,
) -> Result<(), String> {
    let is_markdown = path.extension().and_then(|e| e.to_str()) == Some("md");
    let is_source = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.contains(ext))
        .unwrap_or(false);

    if !is_markdown && !is_source {
        return Ok(());
    }

    let metadata = std::fs::metadata(path).map_err(|e| e.to_string())?;
    if metadata.len() as usize > MAX_FILE_SIZE {
        accumulator.lock().unwrap().skipped_oversized += 1;
        return Ok(());
    }

    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;

    let (mut file, file_errors) = if is_markdown {
        parser::parse_markdown(path, &content, &options.ignore_line_patterns)
    } else {
        (parser::parse_source(path, &content, &options.ignore_line_patterns), Vec::new())
    };

    if let Some((relpath, hash)) = vcs.file_hash(path) {
        file.relative_path = Some(relpath);
        file.file_hash = Some(hash);
        file.repo_root_folder_url = Some(vcs.repo_root_folder_url().to_string());
    }

    let mut acc = accumulator.lock().unwrap();
    acc.errors.extend(file_errors);
    acc.files.push(file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::MemoryAdapter;

    #[test]
    fn scans_markdown_and_source_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("spec.md"),
            "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("lib.rs"), "// [~pkg1/REQ001~impl]\n").unwrap();

        let vcs = MemoryAdapter::new(dir.path(), "https://example.com/blob/main");
        let result = scan(&[dir.path().to_path_buf()], &ScanOptions::default(), &vcs);

        assert!(result.errors.is_empty());
        assert_eq!(result.files.len(), 2);
    }

    #[test]
    fn oversized_files_are_counted_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let huge = "x".repeat(MAX_FILE_SIZE + 1);
        std::fs::write(dir.path().join("big.rs"), huge).unwrap();

        let vcs = MemoryAdapter::new(dir.path(), "https://example.com/blob/main");
        let result = scan(&[dir.path().to_path_buf()], &ScanOptions::default(), &vcs);

        assert!(result.files.is_empty());
        assert_eq!(result.skipped_oversized, 1);
    }

    #[test]
    fn reads_existing_folder_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = FolderManifest::new();
        manifest.insert("https://example.com/a.rs", "hash-a");
        manifest.write(dir.path()).unwrap();
        std::fs::write(dir.path().join("spec.md"), "# hi\n").unwrap();

        let vcs = MemoryAdapter::new(dir.path(), "https://example.com/blob/main");
        let result = scan(&[dir.path().to_path_buf()], &ScanOptions::default(), &vcs);

        assert_eq!(result.existing_manifests.len(), 1);
    }
}
