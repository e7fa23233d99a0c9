//! The folder walker (spec §4.1, §5): breadth-first directory traversal with
//! a bounded worker pool and a bounded, surplus-dropping error channel.
//!
//! This is the only concurrent component in the pipeline; the analyzer and
//! applier run single-threaded on the main thread after this drains.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc;

/// A single I/O-level failure surfaced by the walker (directory read, stat).
#[derive(Debug, Clone)]
pub struct WalkError {
    pub path: PathBuf,
    pub message: String,
}

/// Walks `roots` breadth-first. For each visited directory, `folder_processor`
/// decides whether to descend into it (directory names starting with `.` are
/// always skipped, before `folder_processor` is consulted). Matched files are
/// dispatched to a bounded pool of `worker_count` threads that each invoke
/// `file_processor`; a `file_processor` failure is reported via the bounded
/// error channel of capacity `error_queue_capacity` (surplus errors are
/// dropped rather than blocking the pool).
pub fn walk<FolderProc, FileProc>(
    roots: &[PathBuf],
    worker_count: usize,
    error_queue_capacity: usize,
    folder_processor: FolderProc,
    file_processor: FileProc,
) -> Vec<WalkError>
where
    FolderProc: Fn(&Path) -> bool + Sync,
    FileProc: Fn(&Path) -> Result<(), String> + Sync,
{
    let worker_count = worker_count.max(1);
    let (file_tx, file_rx) = mpsc::sync_channel::<PathBuf>(worker_count * 4);
    let (err_tx, err_rx) = mpsc::sync_channel::<WalkError>(error_queue_capacity.max(1));
    let file_rx = Mutex::new(file_rx);

    let folder_processor_ref = &folder_processor;
    let file_processor_ref = &file_processor;
    let file_rx_ref = &file_rx;

    std::thread::scope(|scope| {
        let producer_err_tx = err_tx.clone();
        scope.spawn(move || {
            let mut queue: VecDeque<PathBuf> = roots.iter().map(|r| absolutize(r)).collect();
            while let Some(dir) = queue.pop_front() {
                if !folder_processor_ref(&dir) {
                    continue;
                }
                let entries = match fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(e) => {
                        let _ = producer_err_tx.try_send(WalkError {
                            path: dir.clone(),
                            message: e.to_string(),
                        });
                        continue;
                    }
                };
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    if name.to_string_lossy().starts_with('.') {
                        continue;
                    }
                    let path = entry.path();
                    let file_type = match entry.file_type() {
                        Ok(ft) => ft,
                        Err(e) => {
                            let _ = producer_err_tx.try_send(WalkError {
                                path: path.clone(),
                                message: e.to_string(),
                            });
                            continue;
                        }
                    };
                    if file_type.is_dir() {
                        queue.push_back(path);
                    } else if file_type.is_file() {
                        // Blocks when the bounded channel is full; this is the
                        // intended back-pressure between producer and pool.
                        if file_tx.send(path).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        for _ in 0..worker_count {
            let worker_err_tx = err_tx.clone();
            scope.spawn(move || loop {
                let next = { file_rx_ref.lock().unwrap().recv() };
                let path = match next {
                    Ok(path) => path,
                    Err(_) => break,
                };
                if let Err(message) = file_processor_ref(&path) {
                    let _ = worker_err_tx.try_send(WalkError { path, message });
                }
            });
        }
    });

    drop(err_tx);
    err_rx.try_iter().collect()
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn visits_every_file_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.md"), "b").unwrap();

        let visited = Mutex::new(Vec::new());
        let errors = walk(
            &[dir.path().to_path_buf()],
            2,
            16,
            |_| true,
            |path| {
                visited.lock().unwrap().push(path.to_path_buf());
                Ok(())
            },
        );

        assert!(errors.is_empty());
        assert_eq!(visited.lock().unwrap().len(), 2);
    }

    #[test]
    fn visits_directories_breadth_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a/deep")).unwrap();

        let visited: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
        walk(
            &[dir.path().to_path_buf()],
            1,
            16,
            |path| {
                visited.lock().unwrap().push(path.to_path_buf());
                true
            },
            |_| Ok(()),
        );

        let visited = visited.into_inner().unwrap();
        let depth1_a = visited.iter().position(|p| p.ends_with("a")).unwrap();
        let depth1_b = visited.iter().position(|p| p.ends_with("b")).unwrap();
        let depth2 = visited.iter().position(|p| p.ends_with("a/deep")).unwrap();
        assert!(depth1_a < depth2, "a/ must be visited before a/deep/");
        assert!(depth1_b < depth2, "b/ (same depth as a/) must be visited before a/deep/");
    }

    #[test]
    fn skips_dot_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        std::fs::write(dir.path().join("visible.md"), "y").unwrap();

        let count = AtomicUsize::new(0);
        walk(
            &[dir.path().to_path_buf()],
            2,
            16,
            |_| true,
            |_path| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn folder_processor_can_skip_a_directory_entirely() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("skip_me")).unwrap();
        std::fs::write(dir.path().join("skip_me/a.md"), "a").unwrap();
        std::fs::write(dir.path().join("keep.md"), "b").unwrap();

        let count = AtomicUsize::new(0);
        walk(
            &[dir.path().to_path_buf()],
            2,
            16,
            |path| !path.ends_with("skip_me"),
            |_path| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn file_processor_errors_surface_in_result() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.md"), "x").unwrap();

        let errors = walk(
            &[dir.path().to_path_buf()],
            1,
            16,
            |_| true,
            |_path| Err("boom".to_string()),
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "boom");
    }

    #[test]
    fn surplus_errors_beyond_capacity_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.md")), "x").unwrap();
        }

        let errors = walk(
            &[dir.path().to_path_buf()],
            1,
            2,
            |_| true,
            |_path| Err("boom".to_string()),
        );

        assert_eq!(errors.len(), 2);
    }
}
