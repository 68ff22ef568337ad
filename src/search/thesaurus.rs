//! Offline-built metadata: synonym thesaurus and per-file keywords.
//!
//! Both artifacts are loaded once and never mutated afterwards. Keys are
//! normalized on load so lookups can use query tokens directly.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::text::{depluralize, normalize};
use crate::error::Result;

/// Normalized term -> ordered related terms
#[derive(Debug, Clone, Default)]
pub struct Thesaurus {
    entries: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThesaurusFile {
    Wrapped { items: HashMap<String, Vec<String>> },
    Flat(HashMap<String, Vec<String>>),
}

impl Thesaurus {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (term, related) in entries {
            let key = normalize(term.as_ref());
            if key.is_empty() {
                continue;
            }
            let list = map.entry(key.clone()).or_default();
            for word in related {
                let word = normalize(word.as_ref());
                if !word.is_empty() && word != key && !list.contains(&word) {
                    list.push(word);
                }
            }
        }
        map.retain(|_, list| !list.is_empty());
        Self { entries: map }
    }

    /// Parse either `{term: [...]}` or `{items: {term: [...]}}`
    pub fn from_json(data: &str) -> Result<Self> {
        let file: ThesaurusFile = serde_json::from_str(data)?;
        let items = match file {
            ThesaurusFile::Wrapped { items } => items,
            ThesaurusFile::Flat(items) => items,
        };
        Ok(Self::new(items))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Related terms for a query token, retrying with a singular form.
    pub fn related(&self, token: &str, cap: usize) -> Vec<String> {
        let hit = self.entries.get(token).or_else(|| {
            depluralize(token).and_then(|singular| self.entries.get(&singular))
        });
        match hit {
            Some(list) => list.iter().take(cap).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File name -> keywords. A missing file means zero keywords.
#[derive(Debug, Clone, Default)]
pub struct KeywordMap {
    entries: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct KeywordItem {
    file: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordFile {
    Annotated { items: Vec<KeywordItem> },
    Flat(HashMap<String, Vec<String>>),
}

impl KeywordMap {
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(file, keywords)| (file.into(), keywords))
                .collect(),
        }
    }

    /// Parse either `{fileName: [...]}` or the annotator's `{items: [{file, keywords}]}`
    pub fn from_json(data: &str) -> Result<Self> {
        let file: KeywordFile = serde_json::from_str(data)?;
        Ok(match file {
            KeywordFile::Annotated { items } => {
                Self::new(items.into_iter().map(|item| (item.file, item.keywords)))
            }
            KeywordFile::Flat(map) => Self::new(map),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn keywords_for(&self, file_name: &str) -> &[String] {
        self.entries
            .get(file_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
