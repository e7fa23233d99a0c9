//! The processing error taxonomy (see spec §7).
//!
//! Parser and analyzer errors are collected, never thrown: every error
//! carries `(code, path, line, message)` and is appended to the owning
//! stage's error list. I/O failures are a different concern and travel as
//! `eyre::Result` instead (see `tracer`).

use std::fmt;
use std::path::{Path, PathBuf};

/// One of the nine error codes from the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Package identifier malformed.
    PkgIdent,
    /// Requirement name malformed.
    ReqIdent,
    /// Status word neither `covered` nor `uncvrd`, or empty when annotated.
    CovStatus,
    /// More than one requirement site on a line.
    MultiSites,
    /// Coverer URL fails URL parsing.
    UrlSyntax,
    /// Code-block opening fence has no closing fence.
    UnmatchedFence,
    /// Markdown file has requirements but no package header.
    NoPkgIdReqs,
    /// Same requirement id declared in two sites.
    DupReqId,
    /// Footnote's embedded package differs from the file header.
    PkgMismatch,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PkgIdent => "pkgident",
            ErrorCode::ReqIdent => "reqident",
            ErrorCode::CovStatus => "covstatus",
            ErrorCode::MultiSites => "multisites",
            ErrorCode::UrlSyntax => "urlsyntax",
            ErrorCode::UnmatchedFence => "unmatchedfence",
            ErrorCode::NoPkgIdReqs => "nopkgidreqs",
            ErrorCode::DupReqId => "dupreqid",
            ErrorCode::PkgMismatch => "pkgmismatch",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single collected processing error.
#[derive(Debug, Clone)]
pub struct ProcessingError {
    pub code: ErrorCode,
    pub path: PathBuf,
    /// 1-indexed line, or 0 when the error is not tied to one line.
    pub line: usize,
    pub message: String,
}

impl ProcessingError {
    pub fn new(code: ErrorCode, path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: [{}] {}",
            self.path.display(),
            self.line,
            self.code,
            self.message
        )
    }
}

impl std::error::Error for ProcessingError {}

/// Render a set of collected errors as the CLI wire format from spec §6:
/// one `path:line: message` line per error, continuation lines (anything
/// after a `\n` in the message) indented by a tab.
pub fn render_errors(errors: &[ProcessingError]) -> String {
    let mut out = String::new();
    for err in errors {
        let mut lines = err.message.lines();
        let first = lines.next().unwrap_or("");
        out.push_str(&format!("{}:{}: [{}] {}\n", err.path.display(), err.line, err.code, first));
        for cont in lines {
            out.push('\t');
            out.push_str(cont);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_cli_wire_format() {
        let err = ProcessingError::new(ErrorCode::DupReqId, "req.md", 10, "duplicate pkg1/REQ001");
        assert_eq!(err.to_string(), "req.md:10: [dupreqid] duplicate pkg1/REQ001");
    }

    #[test]
    fn render_errors_indents_continuations_with_tab() {
        let err = ProcessingError::new(
            ErrorCode::DupReqId,
            "file1.md",
            10,
            "duplicate pkg1/REQ001\nalso declared at file2.md:20",
        );
        let rendered = render_errors(&[err]);
        assert_eq!(
            rendered,
            "file1.md:10: [dupreqid] duplicate pkg1/REQ001\n\talso declared at file2.md:20\n"
        );
    }

    #[test]
    fn render_errors_includes_the_error_code() {
        let err = ProcessingError::new(ErrorCode::NoPkgIdReqs, "spec.md", 3, "no package header");
        let rendered = render_errors(&[err]);
        assert!(rendered.contains("nopkgidreqs"));
    }
}
