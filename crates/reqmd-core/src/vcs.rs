//! The version-control adapter contract (spec §6) and its two implementations.
//!
//! The core only ever depends on the `VcsAdapter` trait; `GitAdapter` is the
//! production backend (shells out to `git`, mirroring the donor's
//! `bump.rs::git_capture` pattern), and `MemoryAdapter` is an in-process test
//! double keyed by relative path, used throughout the test suite.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, bail};

/// The minimal contract the core consumes from the environment (spec §6).
pub trait VcsAdapter {
    /// Absolute path of the repository root.
    fn path_to_root(&self) -> &Path;

    /// An https URL prefix ending with `/blob/<ref>`, suitable for appending
    /// `<relpath>#L<n>`.
    fn repo_root_folder_url(&self) -> &str;

    /// The relative path and content hash of a tracked file, or `None` if the
    /// file is not tracked by this backend.
    fn file_hash(&self, absolute_path: &Path) -> Option<(String, String)>;
}

/// Production adapter: shells out to `git` for tracked-file hashes.
pub struct GitAdapter {
    root: PathBuf,
    folder_url: String,
}

impl GitAdapter {
    /// Discover the repository root containing `start` and build the
    /// adapter, using `remote_url`/`ref_name` to construct the permalink
    /// prefix (e.g. `https://github.com/org/repo/blob/main`).
    pub fn discover(start: &Path, remote_url: &str, ref_name: &str) -> Result<Self> {
        let out = git_capture(start, &["rev-parse", "--show-toplevel"])?;
        let root = PathBuf::from(out.trim());
        let folder_url = format!("{}/blob/{}", remote_url.trim_end_matches('/'), ref_name);
        Ok(Self { root, folder_url })
    }
}

impl VcsAdapter for GitAdapter {
    fn path_to_root(&self) -> &Path {
        &self.root
    }

    fn repo_root_folder_url(&self) -> &str {
        &self.folder_url
    }

    fn file_hash(&self, absolute_path: &Path) -> Option<(String, String)> {
        let relpath = absolute_path.strip_prefix(&self.root).ok()?;
        let relpath_str = relpath.to_string_lossy().replace('\\', "/");
        let out = std::process::Command::new("git")
            .args(["ls-files", "--error-unmatch", &relpath_str])
            .current_dir(&self.root)
            .output()
            .ok()?;
        if !out.status.success() {
            return None;
        }
        let hash_out = std::process::Command::new("git")
            .args(["hash-object", &relpath_str])
            .current_dir(&self.root)
            .output()
            .ok()?;
        if !hash_out.status.success() {
            return None;
        }
        let hash = String::from_utf8(hash_out.stdout).ok()?.trim().to_string();
        Some((relpath_str, hash))
    }
}

/// Run a git command in `cwd` and capture stdout, following the donor's
/// `git_capture` convention.
fn git_capture(cwd: &Path, args: &[&str]) -> Result<String> {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .wrap_err("failed to run git")?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    String::from_utf8(out.stdout).wrap_err_with(|| format!("git {} output is not valid UTF-8", args.join(" ")))
}

/// In-memory test double: file hashes are blake3 digests of registered content,
/// keyed by absolute path.
pub struct MemoryAdapter {
    root: PathBuf,
    folder_url: String,
    files: HashMap<PathBuf, String>,
}

impl MemoryAdapter {
    pub fn new(root: impl Into<PathBuf>, folder_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            folder_url: folder_url.into(),
            files: HashMap::new(),
        }
    }

    /// Register `path` (absolute) as tracked, with its hash derived from `content`.
    pub fn track(&mut self, path: impl Into<PathBuf>, content: &str) -> &mut Self {
        let path = path.into();
        let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        self.files.insert(path, hash);
        self
    }
}

impl VcsAdapter for MemoryAdapter {
    fn path_to_root(&self) -> &Path {
        &self.root
    }

    fn repo_root_folder_url(&self) -> &str {
        &self.folder_url
    }

    fn file_hash(&self, absolute_path: &Path) -> Option<(String, String)> {
        let hash = self.files.get(absolute_path)?.clone();
        let relpath = absolute_path
            .strip_prefix(&self.root)
            .unwrap_or(absolute_path)
            .to_string_lossy()
            .replace('\\', "/");
        Some((relpath, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_adapter_tracks_registered_files() {
        let root = PathBuf::from("/repo");
        let mut vcs = MemoryAdapter::new(root.clone(), "https://example.com/blob/main");
        vcs.track(root.join("src/lib.rs"), "fn main() {}");

        let (relpath, hash) = vcs.file_hash(&root.join("src/lib.rs")).unwrap();
        assert_eq!(relpath, "src/lib.rs");
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn memory_adapter_returns_none_for_untracked_files() {
        let root = PathBuf::from("/repo");
        let vcs = MemoryAdapter::new(root.clone(), "https://example.com/blob/main");
        assert!(vcs.file_hash(&root.join("src/unknown.rs")).is_none());
    }

    #[test]
    fn memory_adapter_hash_is_stable_for_same_content() {
        let root = PathBuf::from("/repo");
        let mut vcs = MemoryAdapter::new(root.clone(), "https://example.com/blob/main");
        vcs.track(root.join("a.rs"), "same");
        vcs.track(root.join("b.rs"), "same");
        let (_, hash_a) = vcs.file_hash(&root.join("a.rs")).unwrap();
        let (_, hash_b) = vcs.file_hash(&root.join("b.rs")).unwrap();
        assert_eq!(hash_a, hash_b);
    }
}
