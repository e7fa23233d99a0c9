//! Common test utilities.

#![allow(dead_code)]

use std::process::Command;

/// A temporary directory set up as a minimal git checkout with an `origin`
/// remote, so the binary's `GitAdapter` discovery succeeds end to end.
pub struct TempRepo {
    pub dir: tempfile::TempDir,
}

impl TempRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        run_git(dir.path(), &["init", "-q"]);
        run_git(dir.path(), &["remote", "add", "origin", "https://example.com/org/repo.git"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test"]);
        Self { dir }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn write(&self, relpath: &str, content: &str) {
        let full = self.path().join(relpath);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, content).unwrap();
    }

    pub fn read(&self, relpath: &str) -> String {
        std::fs::read_to_string(self.path().join(relpath)).unwrap()
    }

    pub fn commit_all(&self) {
        run_git(self.path(), &["add", "-A"]);
        run_git(self.path(), &["commit", "-q", "-m", "snapshot"]);
    }
}

fn run_git(cwd: &std::path::Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {args:?} failed in {}", cwd.display());
}

pub fn reqmd_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_reqmd"))
}
