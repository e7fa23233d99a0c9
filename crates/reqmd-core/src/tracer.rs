//! Tracer: the pipeline façade (spec §4.6). Normalises paths, runs
//! Scanner → Analyzer → Applier strictly in sequence, and aborts before a
//! later stage if an earlier one produced processing errors.

use std::path::PathBuf;

use eyre::Result;
use tracing::info;

use crate::analyzer::{self, AnalyzeResult};
use crate::applier::{self, ApplyMode};
use crate::errors::ProcessingError;
use crate::scanner::{self, ScanOptions};
use crate::vcs::VcsAdapter;
use crate::walker::WalkError;

/// The outcome of a full trace run that aborted due to processing errors
/// before reaching the applier.
#[derive(Debug)]
pub struct TraceErrors {
    pub errors: Vec<ProcessingError>,
}

impl std::fmt::Display for TraceErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::errors::render_errors(&self.errors))
    }
}

impl std::error::Error for TraceErrors {}

/// The outcome of a trace run that aborted due to I/O-level failures while
/// walking the filesystem, before any semantic analysis ran (spec §7: "I/O
/// failures... short-circuit immediately").
#[derive(Debug)]
pub struct WalkErrors {
    pub errors: Vec<WalkError>,
}

impl std::fmt::Display for WalkErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for err in &self.errors {
            writeln!(f, "{}: {}", err.path.display(), err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalkErrors {}

/// Run the full pipeline against `roots` using `vcs` for file hashes and
/// permalinks. Returns `Ok(())` once files and manifests are written (or, in
/// dry-run mode, once the would-be writes have been computed and logged).
pub fn trace(roots: &[PathBuf], options: &ScanOptions, mode: ApplyMode, vcs: &dyn VcsAdapter) -> Result<()> {
    let roots: Vec<PathBuf> = roots
        .iter()
        .map(|r| {
            if r.is_absolute() {
                r.clone()
            } else {
                std::env::current_dir().map(|cwd| cwd.join(r)).unwrap_or_else(|_| r.clone())
            }
        })
        .collect();

    info!(roots = roots.len(), "starting scan");
    let scan_result = scanner::scan(&roots, options, vcs);
    info!(
        files = scan_result.files.len(),
        errors = scan_result.errors.len(),
        skipped = scan_result.skipped_oversized,
        "scan complete"
    );

    if !scan_result.walk_errors.is_empty() {
        return Err(WalkErrors { errors: scan_result.walk_errors }.into());
    }

    if !scan_result.errors.is_empty() {
        return Err(TraceErrors { errors: scan_result.errors }.into());
    }

    let AnalyzeResult { actions, manifests, errors } = analyzer::analyze(&scan_result.files, &scan_result.existing_manifests);
    info!(actions = actions.len(), manifests = manifests.len(), errors = errors.len(), "analysis complete");

    if !errors.is_empty() {
        return Err(TraceErrors { errors }.into());
    }

    let analyze_result = AnalyzeResult { actions, manifests, errors: Vec::new() };
    applier::apply(&analyze_result, mode)?;

    info!("apply complete");
    Ok(())
}
