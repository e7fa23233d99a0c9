//! Regex-backed line recognisers (spec §4.3, §6 "Markdown grammars").
//!
//! Every pattern here is compiled once, process-wide, via `LazyLock`.

use std::sync::LazyLock;

use regex::Regex;

/// A line consisting exactly of `---`, used to delimit the front-matter header.
pub fn is_header_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == "---"
}

static PACKAGE_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^reqmd\.package:\s*(\S+)$").unwrap());

/// Matches `reqmd.package: <id>` inside the front-matter header; captures the raw id text
/// (identifier validity is checked separately via [`crate::ident::is_valid_ident`]).
pub fn match_package_header(line: &str) -> Option<&str> {
    PACKAGE_HEADER_RE
        .captures(line.trim())
        .map(|caps| caps.get(1).unwrap().as_str())
}

/// Matches the opening of a fenced code block: first non-space characters are ``` .
pub fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

static SITE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`~([^~`]*)~`").unwrap());

/// Annotation immediately following a site marker: `<status>[^<id>]<emoji>?`.
/// Anchored to the start of the remaining text so it only matches when contiguous.
static SITE_ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]*)\[\^([^\]]+)\](✅|❓)?").unwrap());

/// One `` `~name~` `` marker found on a line, with its byte range and optional annotation.
#[derive(Debug, Clone)]
pub struct SiteMatch {
    pub name: String,
    pub start: usize,
    pub end: usize,
    /// End of the full occurrence (marker plus annotation, when present);
    /// equal to `end` for a bare site. Callers splicing a rewritten site
    /// back into the line should replace `start..full_end`, not `start..end`,
    /// so the surrounding prose on the line is preserved.
    pub full_end: usize,
    pub has_annotation: bool,
    pub status_word: String,
    pub footnote_id: String,
    pub emoji: Option<String>,
}

/// Finds every requirement-site marker on a line. Callers use the count to detect
/// `multisites`; only the first is meaningful when exactly one is present.
pub fn find_site_matches(line: &str) -> Vec<SiteMatch> {
    let mut matches = Vec::new();
    for m in SITE_MARKER_RE.captures_iter(line) {
        let whole = m.get(0).unwrap();
        let name = m.get(1).unwrap().as_str().to_string();
        let rest = &line[whole.end()..];
        if let Some(ann) = SITE_ANNOTATION_RE.captures(rest) {
            let ann_whole = ann.get(0).unwrap();
            matches.push(SiteMatch {
                name,
                start: whole.start(),
                end: whole.end(),
                full_end: whole.end() + ann_whole.end(),
                has_annotation: true,
                status_word: ann.get(1).unwrap().as_str().to_string(),
                footnote_id: ann.get(2).unwrap().as_str().to_string(),
                emoji: ann.get(3).map(|g| g.as_str().to_string()),
            });
        } else {
            matches.push(SiteMatch {
                name,
                start: whole.start(),
                end: whole.end(),
                full_end: whole.end(),
                has_annotation: false,
                status_word: String::new(),
                footnote_id: String::new(),
                emoji: None,
            });
        }
    }
    matches
}

static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\^([^\]]+)\]:\s*`\[~([^/~]+)/([^~]+)~([^\]]+)\]`\s*(.*)$").unwrap()
});

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap());

/// One parsed `[label](url)` link inside a footnote's coverer list.
#[derive(Debug, Clone)]
pub struct LinkMatch {
    pub label: String,
    pub url: String,
}

/// A parsed footnote line: `[^id]: \`[~pkg/name~type]\` <link>(, <link>)*`.
#[derive(Debug, Clone)]
pub struct FootnoteMatch {
    pub footnote_id: String,
    pub package: String,
    pub requirement_name: String,
    pub coverage_type: String,
    pub links: Vec<LinkMatch>,
}

pub fn match_footnote(line: &str) -> Option<FootnoteMatch> {
    let caps = FOOTNOTE_RE.captures(line)?;
    let links = LINK_RE
        .captures_iter(caps.get(5).unwrap().as_str())
        .map(|m| LinkMatch {
            label: m.get(1).unwrap().as_str().to_string(),
            url: m.get(2).unwrap().as_str().to_string(),
        })
        .collect();
    Some(FootnoteMatch {
        footnote_id: caps.get(1).unwrap().as_str().to_string(),
        package: caps.get(2).unwrap().as_str().to_string(),
        requirement_name: caps.get(3).unwrap().as_str().to_string(),
        coverage_type: caps.get(4).unwrap().as_str().to_string(),
        links,
    })
}

static COVERAGE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[~([A-Za-z][A-Za-z0-9_.]*)/([A-Za-z][A-Za-z0-9_.]*)~([A-Za-z][A-Za-z0-9_]*)\]").unwrap());

/// One `[~pkg/name~type]` coverage tag found outside a requirement site marker.
#[derive(Debug, Clone)]
pub struct TagMatch {
    pub package: String,
    pub name: String,
    pub coverage_type: String,
    pub start: usize,
}

/// Finds coverage tags on a line, excluding any immediately preceded by a backtick
/// (spec §4.3.3: "must be preceded by a character other than a backtick").
pub fn find_tag_matches(line: &str) -> Vec<TagMatch> {
    COVERAGE_TAG_RE
        .captures_iter(line)
        .filter_map(|m| {
            let whole = m.get(0).unwrap();
            if whole.start() > 0 && line.as_bytes()[whole.start() - 1] == b'`' {
                return None;
            }
            Some(TagMatch {
                package: m.get(1).unwrap().as_str().to_string(),
                name: m.get(2).unwrap().as_str().to_string(),
                coverage_type: m.get(3).unwrap().as_str().to_string(),
                start: whole.start(),
            })
        })
        .collect()
}
