//! Applier: idempotent, line-preserving rewrite of Markdown files and sidecar
//! manifests from the analyzer's action list (spec §4.5).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, bail};
use tracing::{debug, info};

use crate::analyzer::AnalyzeResult;
use crate::grammar;
use crate::manifest::FolderManifest;
use crate::model::{LineEnding, MdAction, MdActionKind};

/// Whether the applier writes to disk or only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Write,
    DryRun,
}

/// Apply an [`AnalyzeResult`] to disk: rewrite every Markdown file with
/// pending actions, then write or delete every folder's sidecar manifest.
pub fn apply(result: &AnalyzeResult, mode: ApplyMode) -> Result<()> {
    let mut by_file: BTreeMap<PathBuf, Vec<&MdAction>> = BTreeMap::new();
    for action in &result.actions {
        by_file.entry(action.path.clone()).or_default().push(action);
    }

    for (path, actions) in &by_file {
        apply_to_file(path, actions, mode)?;
    }

    for (folder, manifest) in &result.manifests {
        apply_manifest(folder, manifest, mode)?;
    }

    Ok(())
}

fn apply_to_file(path: &Path, actions: &[&MdAction], mode: ApplyMode) -> Result<()> {
    let content = std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let line_ending = LineEnding::detect(&content);
    let mut lines: Vec<String> = content
        .split(line_ending.as_str())
        .map(|l| l.to_string())
        .collect();
    // Splitting on the delimiter leaves one trailing empty element when the
    // file ends with a newline; drop it, the write step re-adds it.
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    let mut in_place: Vec<&MdAction> = Vec::new();
    let mut appended: Vec<&MdAction> = Vec::new();
    for &action in actions {
        if action.line > 0 {
            in_place.push(action);
        } else {
            appended.push(action);
        }
    }

    for action in &in_place {
        validate_in_place(&lines, action)?;
    }

    for action in &in_place {
        let idx = action.line - 1;
        lines[idx] = match action.kind {
            // A footnote line's grammar spans the entire line, but a site
            // marker can share its line with surrounding prose; splice only
            // the matched span so the rest of the line survives.
            MdActionKind::Footnote => action.data.clone(),
            MdActionKind::Site => splice_site(&lines[idx], action)?,
        };
    }

    if !appended.is_empty() {
        while lines.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
            lines.pop();
        }
        let ends_in_footnote = lines.last().map(|l| grammar::match_footnote(l).is_some()).unwrap_or(false);
        if !ends_in_footnote {
            lines.push(String::new());
        }
        for action in &appended {
            lines.push(action.data.clone());
        }
    }

    debug!(path = %path.display(), actions = actions.len(), "rewriting markdown file");

    if mode == ApplyMode::DryRun {
        info!(path = %path.display(), "dry-run: would write {} line(s)", lines.len());
        return Ok(());
    }

    let mut out = lines.join(line_ending.as_str());
    out.push_str(line_ending.as_str());
    std::fs::write(path, out).wrap_err_with(|| format!("failed to write {}", path.display()))
}

/// Replace just the matched site-marker span (marker plus any existing
/// annotation) within `line` with `action.data`, leaving surrounding prose
/// on the line untouched.
fn splice_site(line: &str, action: &MdAction) -> Result<String> {
    let Some(m) = grammar::find_site_matches(line)
        .into_iter()
        .find(|m| m.name == action.requirement_name)
    else {
        bail!(
            "applier action at {}:{} could not relocate the site marker for requirement {:?}: {:?}",
            action.path.display(),
            action.line,
            action.requirement_name,
            line,
        );
    };
    let mut out = String::with_capacity(line.len() - (m.full_end - m.start) + action.data.len());
    out.push_str(&line[..m.start]);
    out.push_str(&action.data);
    out.push_str(&line[m.full_end..]);
    Ok(out)
}

fn validate_in_place(lines: &[String], action: &MdAction) -> Result<()> {
    let idx = action.line - 1;
    let Some(existing) = lines.get(idx) else {
        bail!(
            "applier action targets {}:{} but the file has only {} line(s)",
            action.path.display(),
            action.line,
            lines.len()
        );
    };

    let matches = match action.kind {
        MdActionKind::Site => grammar::find_site_matches(existing)
            .iter()
            .any(|m| m.name == action.requirement_name),
        MdActionKind::Footnote => grammar::match_footnote(existing)
            .map(|fm| fm.requirement_name == action.requirement_name)
            .unwrap_or(false),
    };

    if !matches {
        bail!(
            "applier action at {}:{} does not match expected grammar for requirement {:?}: {:?}",
            action.path.display(),
            action.line,
            action.requirement_name,
            existing
        );
    }

    Ok(())
}

fn apply_manifest(folder: &Path, manifest: &FolderManifest, mode: ApplyMode) -> Result<()> {
    if mode == ApplyMode::DryRun {
        info!(
            folder = %folder.display(),
            entries = manifest.entries.len(),
            "dry-run: would write manifest"
        );
        return Ok(());
    }
    manifest.write(folder)
}
