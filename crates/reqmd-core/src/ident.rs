//! Identifier grammar shared by package ids and requirement names.
//!
//! Both follow the same dotted-segment shape: `[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*`.

use std::sync::LazyLock;

use regex::Regex;

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(?:\.[A-Za-z][A-Za-z0-9_]*)*$").unwrap());

/// Returns true if `s` is a well-formed package id or requirement name.
pub fn is_valid_ident(s: &str) -> bool {
    IDENT_RE.is_match(s)
}

/// A fully-qualified requirement id: `package/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequirementId {
    pub package: String,
    pub name: String,
}

impl RequirementId {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RequirementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.name)
    }
}
