//! The in-memory data model populated by the scanner and consumed (never
//! mutated) by the analyzer and applier. See spec §3.

use std::path::PathBuf;

use crate::ident::RequirementId;

/// Which line-ending the applier should use when rewriting a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn detect(content: &str) -> Self {
        if content.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// A requirement's coverage status word, or none for a bare site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStatus {
    Covered,
    Uncovered,
}

impl CoverageStatus {
    pub fn word(self) -> &'static str {
        match self {
            CoverageStatus::Covered => "covered",
            CoverageStatus::Uncovered => "uncvrd",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            CoverageStatus::Covered => "✅",
            CoverageStatus::Uncovered => "❓",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "covered" => Some(CoverageStatus::Covered),
            "uncvrd" => Some(CoverageStatus::Uncovered),
            _ => None,
        }
    }

    pub fn from_new_coverers_empty(empty: bool) -> Self {
        if empty {
            CoverageStatus::Uncovered
        } else {
            CoverageStatus::Covered
        }
    }
}

/// A requirement occurrence on one line of a Markdown file.
#[derive(Debug, Clone)]
pub struct RequirementSite {
    pub requirement_name: String,
    pub line: usize,
    pub has_annotation: bool,
    pub status: Option<CoverageStatus>,
    pub footnote_id: Option<String>,
    pub status_emoji: Option<String>,
}

impl RequirementSite {
    pub fn bare(requirement_name: impl Into<String>, line: usize) -> Self {
        Self {
            requirement_name: requirement_name.into(),
            line,
            has_annotation: false,
            status: None,
            footnote_id: None,
            status_emoji: None,
        }
    }
}

/// One source-location link recorded in a footnote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverer {
    /// `relpath:line:type`
    pub coverage_label: String,
    /// Permalink with `#Lnnn` anchor.
    pub coverage_url: String,
    /// VCS content hash of the covering file.
    pub file_hash: String,
}

/// A footnote line in a Markdown file enumerating coverers for one requirement.
#[derive(Debug, Clone)]
pub struct CoverageFootnote {
    pub footnote_id: String,
    pub package_id: Option<String>,
    pub requirement_name: Option<String>,
    pub coverage_type: String,
    pub line: usize,
    pub coverers: Vec<Coverer>,
}

/// A `[~pkg/name~type]` marker found in a source or Markdown file.
#[derive(Debug, Clone)]
pub struct CoverageTag {
    pub requirement_id: RequirementId,
    pub coverage_type: String,
    pub line: usize,
}

/// Whether a scanned file is a Markdown spec or a tagged source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Markdown,
    Source,
}

/// One parsed file.
#[derive(Debug, Clone)]
pub struct FileStructure {
    pub path: PathBuf,
    pub file_type: FileType,
    pub package_id: Option<String>,
    pub requirements: Vec<RequirementSite>,
    pub coverage_footnotes: Vec<CoverageFootnote>,
    pub coverage_tags: Vec<CoverageTag>,
    pub file_hash: Option<String>,
    pub relative_path: Option<String>,
    pub repo_root_folder_url: Option<String>,
    pub line_ending: LineEnding,
}

impl FileStructure {
    pub fn new(path: PathBuf, file_type: FileType) -> Self {
        Self {
            path,
            file_type,
            package_id: None,
            requirements: Vec::new(),
            coverage_footnotes: Vec::new(),
            coverage_tags: Vec::new(),
            file_hash: None,
            relative_path: None,
            repo_root_folder_url: None,
            line_ending: LineEnding::Lf,
        }
    }

    pub fn has_requirements(&self) -> bool {
        !self.requirements.is_empty()
    }
}

/// A pending Markdown edit, synthesised by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdActionKind {
    Site,
    Footnote,
}

#[derive(Debug, Clone)]
pub struct MdAction {
    pub kind: MdActionKind,
    pub path: PathBuf,
    /// 1-indexed target line, or 0 to append.
    pub line: usize,
    pub requirement_name: String,
    pub data: String,
}
