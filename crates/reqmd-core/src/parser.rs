//! The line-oriented file parser (spec §4.2, §4.3).
//!
//! One pass per file: Markdown files go through the front-matter/code-block
//! state machine and the requirement/footnote/tag grammars; source files are
//! scanned only for coverage tags.

use std::path::Path;

use regex::Regex;

use crate::errors::{ErrorCode, ProcessingError};
use crate::grammar;
use crate::ident::is_valid_ident;
use crate::model::{CoverageFootnote, CoverageTag, Coverer, FileStructure, FileType, LineEnding, RequirementSite};
use crate::model::CoverageStatus;
use crate::ident::RequirementId;

/// Maximum processed file size (spec §6): larger files are counted as skipped.
pub const MAX_FILE_SIZE: usize = 128 * 1024;

enum LineAction {
    Keep,
    Skip,
}

fn ignore_line(line: &str, ignore_patterns: &[Regex]) -> LineAction {
    if ignore_patterns.iter().any(|re| re.is_match(line)) {
        LineAction::Skip
    } else {
        LineAction::Keep
    }
}

/// Parse a Markdown file's content into a [`FileStructure`], collecting
/// semantic parser errors along the way.
pub fn parse_markdown(
    path: &Path,
    content: &str,
    ignore_patterns: &[Regex],
) -> (FileStructure, Vec<ProcessingError>) {
    let mut file = FileStructure::new(path.to_path_buf(), FileType::Markdown);
    file.line_ending = LineEnding::detect(content);
    let mut errors = Vec::new();

    let mut in_header = false;
    let mut header_closed = false;
    let mut in_code_block = false;
    let mut fence_open_line = 0usize;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');

        if line_no == 1 && grammar::is_header_delimiter(line) {
            in_header = true;
            continue;
        }
        if in_header {
            if grammar::is_header_delimiter(line) {
                in_header = false;
                header_closed = true;
                continue;
            }
            if let Some(raw_id) = grammar::match_package_header(line) {
                if is_valid_ident(raw_id) {
                    file.package_id = Some(raw_id.to_string());
                } else {
                    errors.push(ProcessingError::new(
                        ErrorCode::PkgIdent,
                        path,
                        line_no,
                        format!("malformed package identifier: {raw_id}"),
                    ));
                }
            }
            continue;
        }
        let _ = header_closed;

        if let LineAction::Skip = ignore_line(line, ignore_patterns) {
            continue;
        }

        if grammar::is_fence_line(line) {
            if !in_code_block {
                in_code_block = true;
                fence_open_line = line_no;
            } else {
                in_code_block = false;
            }
            continue;
        }
        if in_code_block {
            continue;
        }

        // An `ignoreme*` package still returns a typed Markdown file with its
        // coverage tags collected (it may itself be a source of coverage for
        // some other package's requirement); only its own requirement sites
        // and footnotes are suppressed.
        let ignoreme = file.package_id.as_deref().map(|p| p.starts_with("ignoreme")).unwrap_or(false);

        if !ignoreme {
            let sites = grammar::find_site_matches(line);
            if sites.len() > 1 {
                errors.push(ProcessingError::new(
                    ErrorCode::MultiSites,
                    path,
                    line_no,
                    format!("more than one requirement site on line: {line}"),
                ));
            } else if let Some(site) = sites.into_iter().next() {
                if !is_valid_ident(&site.name) {
                    errors.push(ProcessingError::new(
                        ErrorCode::ReqIdent,
                        path,
                        line_no,
                        format!("malformed requirement name: {}", site.name),
                    ));
                } else if site.has_annotation {
                    match CoverageStatus::from_word(&site.status_word) {
                        Some(status) => {
                            file.requirements.push(RequirementSite {
                                requirement_name: site.name,
                                line: line_no,
                                has_annotation: true,
                                status: Some(status),
                                footnote_id: Some(site.footnote_id),
                                status_emoji: site.emoji,
                            });
                        }
                        None => {
                            errors.push(ProcessingError::new(
                                ErrorCode::CovStatus,
                                path,
                                line_no,
                                format!("invalid status word: {:?}", site.status_word),
                            ));
                        }
                    }
                } else {
                    file.requirements.push(RequirementSite::bare(site.name, line_no));
                }
            }

            if let Some(fm) = grammar::match_footnote(line) {
                let mut coverers = Vec::new();
                for link in &fm.links {
                    match url::Url::parse(&link.url) {
                        Ok(_) => coverers.push(Coverer {
                            coverage_label: link.label.clone(),
                            coverage_url: link.url.clone(),
                            file_hash: String::new(),
                        }),
                        Err(e) => {
                            errors.push(ProcessingError::new(
                                ErrorCode::UrlSyntax,
                                path,
                                line_no,
                                format!("invalid coverer URL {:?}: {e}", link.url),
                            ));
                        }
                    }
                }
                file.coverage_footnotes.push(CoverageFootnote {
                    footnote_id: fm.footnote_id,
                    package_id: Some(fm.package),
                    requirement_name: Some(fm.requirement_name),
                    coverage_type: fm.coverage_type,
                    line: line_no,
                    coverers,
                });
            }
        }

        for tag in grammar::find_tag_matches(line) {
            if is_valid_ident(&tag.package) && is_valid_ident(&tag.name) {
                file.coverage_tags.push(CoverageTag {
                    requirement_id: RequirementId::new(tag.package, tag.name),
                    coverage_type: tag.coverage_type,
                    line: line_no,
                });
            }
        }
    }

    if in_code_block {
        errors.push(ProcessingError::new(
            ErrorCode::UnmatchedFence,
            path,
            fence_open_line,
            "code block opened here has no closing fence",
        ));
    }

    (file, errors)
}

/// Parse a source file's content for coverage tags only (spec §4.3.3).
pub fn parse_source(path: &Path, content: &str, ignore_patterns: &[Regex]) -> FileStructure {
    let mut file = FileStructure::new(path.to_path_buf(), FileType::Source);
    file.line_ending = LineEnding::detect(content);

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');
        if let LineAction::Skip = ignore_line(line, ignore_patterns) {
            continue;
        }
        for tag in grammar::find_tag_matches(line) {
            if is_valid_ident(&tag.package) && is_valid_ident(&tag.name) {
                file.coverage_tags.push(CoverageTag {
                    requirement_id: RequirementId::new(tag.package, tag.name),
                    coverage_type: tag.coverage_type,
                    line: line_no,
                });
            }
        }
    }

    file
}
