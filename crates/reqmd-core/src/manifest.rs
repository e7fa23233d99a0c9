//! The per-folder sidecar manifest (spec §6 "Sidecar manifest", §4.4 Phase D).
//!
//! File name `reqmd.json`, mapping `file-url-without-anchor` to `file-hash`.
//! Serialised with a custom `Serialize` impl over a `BTreeMap` so keys come
//! out sorted, following the donor's `markdown.rs::RulesManifest` pattern.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

pub const MANIFEST_FILE_NAME: &str = "reqmd.json";

/// A folder's `reqmd.json`: coverer URL (without `#Lnnn` anchor) to content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderManifest {
    pub entries: BTreeMap<String, String>,
}

impl FolderManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, url_without_anchor: impl Into<String>, hash: impl Into<String>) {
        self.entries.insert(url_without_anchor.into(), hash.into());
    }

    /// Strip a `#L<n>` suffix from a coverer URL, as required by the manifest key shape.
    pub fn strip_anchor(url: &str) -> &str {
        match url.rfind("#L") {
            Some(idx) => &url[..idx],
            None => url,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("failed to serialize folder manifest to JSON")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(s).wrap_err("malformed reqmd.json")?;
        Ok(Self {
            entries: raw.file_url_2_file_hash,
        })
    }

    /// Read an existing sidecar manifest from `folder`, if present.
    pub fn read_existing(folder: &Path) -> Result<Option<Self>> {
        let path = folder.join(MANIFEST_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Ok(Some(Self::from_json(&content)?))
    }

    /// Write this manifest to `folder`, or delete the sidecar if empty.
    pub fn write(&self, folder: &Path) -> Result<()> {
        let path = folder.join(MANIFEST_FILE_NAME);
        if self.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)
                    .wrap_err_with(|| format!("failed to remove {}", path.display()))?;
            }
            return Ok(());
        }
        let mut json = self.to_json();
        json.push('\n');
        std::fs::write(&path, json).wrap_err_with(|| format!("failed to write {}", path.display()))
    }
}

#[derive(serde::Deserialize)]
struct RawManifest {
    #[serde(rename = "FileUrl2FileHash")]
    file_url_2_file_hash: BTreeMap<String, String>,
}

impl serde::Serialize for FolderManifest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("FileUrl2FileHash", &self.entries)?;
        map.end()
    }
}

/// A path-keyed set of per-folder manifests, as produced by Analyzer Phase D.
pub type ManifestSet = BTreeMap<PathBuf, FolderManifest>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_anchor() {
        assert_eq!(
            FolderManifest::strip_anchor("https://example.com/a.rs#L10"),
            "https://example.com/a.rs"
        );
        assert_eq!(FolderManifest::strip_anchor("https://example.com/a.rs"), "https://example.com/a.rs");
    }

    #[test]
    fn json_round_trip_preserves_entries() {
        let mut manifest = FolderManifest::new();
        manifest.insert("https://example.com/b.rs", "hash-b");
        manifest.insert("https://example.com/a.rs", "hash-a");

        let json = manifest.to_json();
        let parsed = FolderManifest::from_json(&json).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn json_keys_are_sorted() {
        let mut manifest = FolderManifest::new();
        manifest.insert("z.rs", "1");
        manifest.insert("a.rs", "2");
        let json = manifest.to_json();
        assert!(json.find("a.rs").unwrap() < json.find("z.rs").unwrap());
    }

    #[test]
    fn empty_manifest_deletes_existing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        std::fs::write(&path, "{}").unwrap();

        let manifest = FolderManifest::new();
        manifest.write(dir.path()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn nonempty_manifest_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = FolderManifest::new();
        manifest.insert("https://example.com/a.rs", "hash-a");
        manifest.write(dir.path()).unwrap();

        let path = dir.path().join(MANIFEST_FILE_NAME);
        assert!(path.exists());
        let round_tripped = FolderManifest::read_existing(dir.path()).unwrap().unwrap();
        assert_eq!(round_tripped, manifest);
    }
}
