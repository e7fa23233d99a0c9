//! Analyzer: semantic linking of requirement declarations to coverage tags,
//! diffing against current Markdown state, and footnote-id allocation
//! (spec §4.4, phases A-D).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::{ErrorCode, ProcessingError};
use crate::ident::RequirementId;
use crate::manifest::{FolderManifest, ManifestSet};
use crate::model::{CoverageStatus, Coverer, FileStructure, FileType, MdAction, MdActionKind};

/// Analyzer-internal record of one requirement's coverage state. Holds an
/// index into the scanner's file vector rather than a back-pointer, per the
/// arena-and-index convention for this kind of cyclic reference.
#[derive(Debug, Clone)]
struct RequirementCoverage {
    requirement_id: RequirementId,
    file_index: usize,
    site_line: usize,
    has_annotation: bool,
    existing_status_word: String,
    existing_footnote_id: Option<String>,
    footnote_type: Option<String>,
    existing_footnote_line: usize,
    current_coverers: Vec<Coverer>,
    new_coverers: Vec<Coverer>,
}

pub struct AnalyzeResult {
    pub actions: Vec<MdAction>,
    pub manifests: ManifestSet,
    pub errors: Vec<ProcessingError>,
}

/// Run phases A-D over the scanner's full file set.
pub fn analyze(files: &[FileStructure], existing_manifests: &ManifestSet) -> AnalyzeResult {
    let mut errors = Vec::new();
    let mut coverages: Vec<RequirementCoverage> = Vec::new();
    let mut by_requirement_id: HashMap<RequirementId, usize> = HashMap::new();
    let mut max_footnote_id: HashMap<PathBuf, u64> = HashMap::new();

    // Phase A: build coverages.
    for (file_index, file) in files.iter().enumerate() {
        if file.file_type != FileType::Markdown {
            continue;
        }

        if file.has_requirements() && file.package_id.as_deref().unwrap_or("").is_empty() {
            let first_line = file.requirements[0].line;
            errors.push(ProcessingError::new(
                ErrorCode::NoPkgIdReqs,
                &file.path,
                first_line,
                "markdown file declares requirements but has no reqmd.package header",
            ));
        }

        for footnote in &file.coverage_footnotes {
            track_numeric_id(&mut max_footnote_id, &file.path, &footnote.footnote_id);
            if let (Some(header_pkg), Some(footnote_pkg)) = (&file.package_id, &footnote.package_id) {
                if header_pkg != footnote_pkg {
                    errors.push(ProcessingError::new(
                        ErrorCode::PkgMismatch,
                        &file.path,
                        footnote.line,
                        format!("footnote package {footnote_pkg:?} does not match file header package {header_pkg:?}"),
                    ));
                }
            }
        }

        let Some(package_id) = file.package_id.clone().filter(|p| !p.is_empty()) else {
            continue;
        };

        for site in &file.requirements {
            if let Some(id) = &site.footnote_id {
                track_numeric_id(&mut max_footnote_id, &file.path, id);
            }

            let requirement_id = RequirementId::new(package_id.clone(), site.requirement_name.clone());

            if let Some(&existing_index) = by_requirement_id.get(&requirement_id) {
                let existing = &coverages[existing_index];
                let existing_file = &files[existing.file_index];
                errors.push(ProcessingError::new(
                    ErrorCode::DupReqId,
                    &existing_file.path,
                    existing.site_line,
                    format!(
                        "duplicate requirement id {requirement_id}; also declared at {}:{}",
                        file.path.display(),
                        site.line
                    ),
                ));
                continue;
            }

            let attached = site.footnote_id.as_ref().and_then(|id| {
                file.coverage_footnotes.iter().find(|fnote| &fnote.footnote_id == id)
            });

            let coverage = RequirementCoverage {
                requirement_id: requirement_id.clone(),
                file_index,
                site_line: site.line,
                has_annotation: site.has_annotation,
                existing_status_word: site.status.map(|s| s.word().to_string()).unwrap_or_default(),
                existing_footnote_id: site.footnote_id.clone(),
                footnote_type: attached.map(|f| f.coverage_type.clone()),
                existing_footnote_line: attached.map(|f| f.line).unwrap_or(0),
                current_coverers: attached.map(|f| f.coverers.clone()).unwrap_or_default(),
                new_coverers: Vec::new(),
            };

            let index = coverages.len();
            coverages.push(coverage);
            by_requirement_id.insert(requirement_id, index);
        }
    }

    // Phase B: attach new coverers discovered from coverage tags.
    for (file_index, file) in files.iter().enumerate() {
        for tag in &file.coverage_tags {
            let Some(&coverage_index) = by_requirement_id.get(&tag.requirement_id) else {
                continue; // unknown requirement id: silently ignored, may be cross-repo
            };
            let (Some(relpath), Some(hash)) = (&file.relative_path, &file.file_hash) else {
                continue; // untracked file contributes no coverer
            };
            let Some(folder_url) = &file.repo_root_folder_url else {
                continue;
            };
            let coverer = Coverer {
                coverage_label: format!("{relpath}:{}:{}", tag.line, tag.coverage_type),
                coverage_url: format!("{folder_url}/{relpath}#L{}", tag.line),
                file_hash: hash.clone(),
            };
            coverages[coverage_index].new_coverers.push(coverer);
            if coverages[coverage_index].footnote_type.is_none() {
                coverages[coverage_index].footnote_type = Some(tag.coverage_type.clone());
            }
            let _ = file_index;
        }
    }

    // Phase C: synthesise actions, in ascending (file-path, site-line) order.
    let mut order: Vec<usize> = (0..coverages.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = &files[coverages[a].file_index].path;
        let fb = &files[coverages[b].file_index].path;
        fa.cmp(fb).then(coverages[a].site_line.cmp(&coverages[b].site_line))
    });

    let mut next_footnote_id: HashMap<PathBuf, u64> = HashMap::new();
    let mut actions = Vec::new();

    for &idx in &order {
        let cov = &mut coverages[idx];
        cov.current_coverers.sort_by(|a, b| a.coverage_url.cmp(&b.coverage_url));
        cov.new_coverers.sort_by(|a, b| a.coverage_url.cmp(&b.coverage_url));

        let status = CoverageStatus::from_new_coverers_empty(cov.new_coverers.is_empty());
        let file_path = files[cov.file_index].path.clone();

        let footnote_id = match &cov.existing_footnote_id {
            Some(id) => id.clone(),
            None => {
                let seed = *max_footnote_id.get(&file_path).unwrap_or(&0);
                let next = next_footnote_id.entry(file_path.clone()).or_insert(seed);
                *next += 1;
                next.to_string()
            }
        };

        let site_changed = !cov.has_annotation || cov.existing_status_word != status.word();
        if site_changed {
            let data = format!(
                "`~{}~`{}[^{}]{}",
                cov.requirement_id.name,
                status.word(),
                footnote_id,
                status.emoji()
            );
            actions.push(MdAction {
                kind: MdActionKind::Site,
                path: file_path.clone(),
                line: cov.site_line,
                requirement_name: cov.requirement_id.name.clone(),
                data,
            });
        }

        let no_prior_footnote = cov.existing_footnote_id.is_none() && cov.existing_footnote_line == 0;
        let coverers_differ = !coverers_equal(&cov.current_coverers, &cov.new_coverers);
        let footnote_changed = no_prior_footnote || coverers_differ;

        if footnote_changed {
            let footnote_type = cov.footnote_type.clone().unwrap_or_else(|| "impl".to_string());
            let links = cov
                .new_coverers
                .iter()
                .map(|c| format!("[{}]({})", c.coverage_label, c.coverage_url))
                .collect::<Vec<_>>()
                .join(", ");
            let data = format!(
                "[^{}]: `[~{}/{}~{}]` {}",
                footnote_id, cov.requirement_id.package, cov.requirement_id.name, footnote_type, links
            );
            actions.push(MdAction {
                kind: MdActionKind::Footnote,
                path: file_path,
                line: cov.existing_footnote_line,
                requirement_name: cov.requirement_id.name.clone(),
                data,
            });
        }
    }

    // Phase D: manifests. Dirtiness is a property of the *hashes* a folder's
    // coverers resolve to this scan, not of whether any footnote text was
    // rewritten — a coverer's line can stay put while the file behind it is
    // re-hashed (S4), and that must still bump the manifest even though no
    // Markdown action fires for it. So: build each folder's manifest purely
    // from this scan's `new-coverers` (the only place a fresh `file-hash`
    // can come from; footnotes never embed one — see parser.rs), then diff
    // the whole folder against what was already on disk.
    let mut fresh_by_folder: ManifestSet = ManifestSet::new();
    for cov in &coverages {
        if cov.new_coverers.is_empty() {
            continue;
        }
        let folder = files[cov.file_index].path.parent().unwrap_or(std::path::Path::new("")).to_path_buf();
        let manifest = fresh_by_folder.entry(folder).or_default();
        for coverer in &cov.new_coverers {
            let key = FolderManifest::strip_anchor(&coverer.coverage_url).to_string();
            manifest.insert(key, coverer.file_hash.clone());
        }
    }

    let mut folders_with_markdown: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();
    for file in files {
        if file.file_type == FileType::Markdown {
            folders_with_markdown
                .insert(file.path.parent().unwrap_or(std::path::Path::new("")).to_path_buf());
        }
    }

    let mut manifests: ManifestSet = ManifestSet::new();
    for folder in folders_with_markdown {
        let fresh = fresh_by_folder.get(&folder).cloned().unwrap_or_default();
        let dirty = match existing_manifests.get(&folder) {
            Some(prior) => prior.entries != fresh.entries,
            None => !fresh.is_empty(),
        };
        if dirty {
            manifests.insert(folder, fresh);
        }
    }

    AnalyzeResult { actions, manifests, errors }
}

fn coverers_equal(a: &[Coverer], b: &[Coverer]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| x.coverage_url == y.coverage_url)
}

fn track_numeric_id(max_ids: &mut HashMap<PathBuf, u64>, path: &std::path::Path, id: &str) {
    if let Ok(n) = id.parse::<u64>() {
        let entry = max_ids.entry(path.to_path_buf()).or_insert(0);
        if n > *entry {
            *entry = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestSet;
    use crate::parser::parse_markdown;
    use std::path::PathBuf;

    fn scan_one(path: &str, content: &str) -> FileStructure {
        let (mut file, _) = parse_markdown(std::path::Path::new(path), content, &[]);
        file.relative_path = Some(path.to_string());
        file.file_hash = Some("deadbeef".to_string());
        file.repo_root_folder_url = Some("https://example.com/blob/main".to_string());
        file
    }

    #[test]
    fn new_coverage_is_discovered_and_marked_covered() {
        let md = scan_one("spec.md", "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`\n");
        let mut source = crate::model::FileStructure::new(PathBuf::from("src/lib.rs"), FileType::Source);
        source.relative_path = Some("src/lib.rs".to_string());
        source.file_hash = Some("hash-src".to_string());
        source.repo_root_folder_url = Some("https://example.com/blob/main".to_string());
        source.coverage_tags.push(crate::model::CoverageTag {
            requirement_id: RequirementId::new("pkg1", "REQ001"),
            coverage_type: "impl".to_string(),
            line: 10,
        });

        let result = analyze(&[md, source], &ManifestSet::new());
        assert!(result.errors.is_empty());
        assert_eq!(result.actions.len(), 2);
        let site_action = result.actions.iter().find(|a| a.kind == MdActionKind::Site).unwrap();
        assert!(site_action.data.contains("covered"));
        assert!(site_action.data.contains('✅'));
    }

    #[test]
    fn missing_coverage_is_marked_uncovered() {
        let md = scan_one("spec.md", "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`\n");
        let result = analyze(&[md], &ManifestSet::new());
        let site_action = result.actions.iter().find(|a| a.kind == MdActionKind::Site).unwrap();
        assert!(site_action.data.contains("uncvrd"));
        assert!(site_action.data.contains('❓'));
    }

    #[test]
    fn duplicate_requirement_id_is_an_error() {
        let md = scan_one(
            "spec.md",
            "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`\n\nmore text\n\n`~REQ001~`\n",
        );
        let result = analyze(&[md], &ManifestSet::new());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::DupReqId);
    }

    #[test]
    fn already_correct_site_produces_no_site_action() {
        let md = scan_one(
            "spec.md",
            "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`uncvrd[^1]❓\n\n[^1]: `[~pkg1/REQ001~impl]` \n",
        );
        let result = analyze(&[md], &ManifestSet::new());
        assert!(result.actions.iter().all(|a| a.kind != MdActionKind::Site));
    }

    #[test]
    fn unchanged_coverage_is_idempotent_across_runs() {
        let md = scan_one("spec.md", "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`\n");
        let mut source = crate::model::FileStructure::new(PathBuf::from("src/lib.rs"), FileType::Source);
        source.relative_path = Some("src/lib.rs".to_string());
        source.file_hash = Some("hash-src".to_string());
        source.repo_root_folder_url = Some("https://example.com/blob/main".to_string());
        source.coverage_tags.push(crate::model::CoverageTag {
            requirement_id: RequirementId::new("pkg1", "REQ001"),
            coverage_type: "impl".to_string(),
            line: 10,
        });

        let first = analyze(&[md.clone(), source.clone()], &ManifestSet::new());
        assert_eq!(first.actions.len(), 2);

        // Re-apply the emitted site/footnote text as if the applier had run,
        // then re-scan: a second pass should produce no further actions.
        let site_action = first.actions.iter().find(|a| a.kind == MdActionKind::Site).unwrap();
        let footnote_action = first.actions.iter().find(|a| a.kind == MdActionKind::Footnote).unwrap();
        let rewritten = format!(
            "---\nreqmd.package: pkg1\n---\n\n{}\n\n{}\n",
            site_action.data, footnote_action.data
        );
        let md2 = scan_one("spec.md", &rewritten);
        let second = analyze(&[md2, source], &ManifestSet::new());
        assert!(second.actions.is_empty());
    }

    #[test]
    fn manifest_only_emitted_for_dirty_folders() {
        let unrelated = scan_one(
            "docs/other.md",
            "---\nreqmd.package: pkg2\n---\n\n`~OTHER~`uncvrd[^1]❓\n\n[^1]: `[~pkg2/OTHER~impl]` \n",
        );
        let md = scan_one("spec.md", "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`\n");
        let mut source = crate::model::FileStructure::new(PathBuf::from("src/lib.rs"), FileType::Source);
        source.relative_path = Some("src/lib.rs".to_string());
        source.file_hash = Some("hash-src".to_string());
        source.repo_root_folder_url = Some("https://example.com/blob/main".to_string());
        source.coverage_tags.push(crate::model::CoverageTag {
            requirement_id: RequirementId::new("pkg1", "REQ001"),
            coverage_type: "impl".to_string(),
            line: 10,
        });

        let result = analyze(&[unrelated, md, source], &ManifestSet::new());
        assert_eq!(result.manifests.len(), 1);
        assert!(result.manifests.contains_key(&PathBuf::from("")));
    }

    #[test]
    fn hash_only_refresh_dirties_the_manifest_without_a_footnote_action() {
        let md = scan_one(
            "spec.md",
            "---\nreqmd.package: pkg1\n---\n\n`~REQ001~`covered[^1]✅\n\n\
             [^1]: `[~pkg1/REQ001~impl]` [src/lib.rs:10:impl](https://example.com/blob/main/src/lib.rs#L10)\n",
        );
        let mut source = crate::model::FileStructure::new(PathBuf::from("src/lib.rs"), FileType::Source);
        source.relative_path = Some("src/lib.rs".to_string());
        source.file_hash = Some("new-hash".to_string());
        source.repo_root_folder_url = Some("https://example.com/blob/main".to_string());
        source.coverage_tags.push(crate::model::CoverageTag {
            requirement_id: RequirementId::new("pkg1", "REQ001"),
            coverage_type: "impl".to_string(),
            line: 10,
        });

        let mut prior_manifest = crate::manifest::FolderManifest::new();
        prior_manifest.insert("https://example.com/blob/main/src/lib.rs", "old-hash");
        let mut existing_manifests = ManifestSet::new();
        existing_manifests.insert(PathBuf::from(""), prior_manifest);

        let result = analyze(&[md, source], &existing_manifests);

        // Same URL, same footnote text: no Markdown action fires...
        assert!(result.actions.iter().all(|a| a.kind != MdActionKind::Footnote));
        // ...but the manifest must still pick up the refreshed hash.
        let manifest = result.manifests.get(&PathBuf::from("")).expect("folder should be dirty");
        assert_eq!(
            manifest.entries.get("https://example.com/blob/main/src/lib.rs"),
            Some(&"new-hash".to_string())
        );
    }
}
