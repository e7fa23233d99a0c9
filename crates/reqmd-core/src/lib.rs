//! reqmd-core - the requirements-traceability engine.
//!
//! Three stages, run strictly in sequence by [`tracer::trace`]:
//! [`scanner`] discovers and parses Markdown/source files, [`analyzer`]
//! links requirement declarations to coverage tags, and [`applier`]
//! rewrites Markdown files and per-folder manifests to match.

pub mod analyzer;
pub mod applier;
pub mod errors;
pub mod grammar;
pub mod ident;
pub mod manifest;
pub mod model;
pub mod parser;
pub mod scanner;
pub mod tracer;
pub mod vcs;
pub mod walker;

pub use analyzer::AnalyzeResult;
pub use applier::ApplyMode;
pub use errors::{ErrorCode, ProcessingError, render_errors};
pub use ident::RequirementId;
pub use manifest::{FolderManifest, ManifestSet};
pub use model::{CoverageFootnote, CoverageStatus, CoverageTag, Coverer, FileStructure, FileType, MdAction, MdActionKind};
pub use scanner::{ScanOptions, ScanResult};
pub use tracer::{TraceErrors, WalkErrors, trace};
pub use vcs::{GitAdapter, MemoryAdapter, VcsAdapter};
pub use walker::WalkError;
