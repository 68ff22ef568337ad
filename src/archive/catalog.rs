//! Zip catalog - enumerates an archive once and decompresses entries on demand.
//!
//! Both decoder variants own one of these, so they produce identical items
//! for the same buffer.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{Result, ShelfError};
use crate::search::compare_names;

/// One accepted archive entry, addressed by its base name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedItem {
    pub name: String,
    pub extension: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Items kept
    pub total: usize,
    /// Later entries sharing a base name with a kept one
    pub duplicates: usize,
    /// Entries with another extension or no usable name
    pub ignored: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub items: Vec<IngestedItem>,
    pub stats: IngestStats,
}

pub struct ZipCatalog {
    archive: ZipArchive<Cursor<Arc<[u8]>>>,
    /// Base name -> full entry path
    entries: HashMap<String, String>,
}

impl ZipCatalog {
    /// Enumerate `buffer`, keeping the first entry per base name with `extension`.
    pub fn open(buffer: Arc<[u8]>, extension: &str) -> Result<(Self, IngestReport)> {
        let mut archive = ZipArchive::new(Cursor::new(buffer))
            .map_err(|e| ShelfError::Parse(format!("malformed archive: {e}")))?;

        let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());
        let mut entries = HashMap::new();
        let mut items = Vec::new();
        let mut stats = IngestStats::default();

        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| ShelfError::Parse(format!("entry {i}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let path = entry.name().to_string();
            if !path.to_lowercase().ends_with(&suffix) {
                stats.ignored += 1;
                continue;
            }
            let name = base_name(&path);
            if name.is_empty() {
                stats.ignored += 1;
                continue;
            }
            if entries.contains_key(name) {
                stats.duplicates += 1;
                continue;
            }
            items.push(IngestedItem {
                name: name.to_string(),
                extension: suffix[1..].to_string(),
            });
            entries.insert(name.to_string(), path.clone());
        }

        items.sort_by(|a, b| compare_names(&a.name, &b.name));
        stats.total = items.len();

        Ok((Self { archive, entries }, IngestReport { items, stats }))
    }

    /// Decompress one entry as text
    pub fn read(&mut self, name: &str) -> Result<String> {
        let path = self
            .entries
            .get(name)
            .ok_or_else(|| ShelfError::NotFound(name.to_string()))?;
        let mut file = self.archive.by_name(path)?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| ShelfError::Parse(format!("{name}: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Last path component, accepting both separators
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Build an in-memory zip from (path, contents) pairs
    pub(crate) fn zip_of(entries: &[(&str, &str)]) -> Arc<[u8]> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (path, contents) in entries {
            if path.ends_with('/') {
                writer.add_directory(*path, FileOptions::default()).unwrap();
            } else {
                writer.start_file(*path, FileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner().into()
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/Acme.svg"), "Acme.svg");
        assert_eq!(base_name("a\\b\\Acme.svg"), "Acme.svg");
        assert_eq!(base_name("Acme.svg"), "Acme.svg");
        assert_eq!(base_name("dir/"), "");
    }

    #[test]
    fn test_open_dedups_and_sorts() {
        let buffer = zip_of(&[
            ("Beta.svg", "<svg>b</svg>"),
            ("Acme.svg", "<svg>a</svg>"),
            ("sub/", ""),
            ("sub/Acme.svg", "<svg>dup</svg>"),
            ("notes.txt", "hello"),
        ]);
        let (mut catalog, report) = ZipCatalog::open(buffer, "svg").unwrap();

        let names: Vec<_> = report.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Acme.svg", "Beta.svg"]);
        assert_eq!(
            report.stats,
            IngestStats {
                total: 2,
                duplicates: 1,
                ignored: 1
            }
        );
        assert_eq!(catalog.read("Acme.svg").unwrap(), "<svg>a</svg>");
        assert!(matches!(
            catalog.read("Gamma.svg"),
            Err(ShelfError::NotFound(_))
        ));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let buffer = zip_of(&[("LOGO.SVG", "<svg/>")]);
        let (_, report) = ZipCatalog::open(buffer, "svg").unwrap();
        assert_eq!(report.items[0].name, "LOGO.SVG");
        assert_eq!(report.items[0].extension, "svg");
    }

    #[test]
    fn test_malformed_archive() {
        let buffer: Arc<[u8]> = Arc::from(&b"definitely not a zip"[..]);
        assert!(matches!(
            ZipCatalog::open(buffer, "svg"),
            Err(ShelfError::Parse(_))
        ));
    }
}
