//! Search module - Prefix-token inverted index over the loaded assets
//!
//! The index is built once per archive generation and answers every
//! keystroke from pre-built state:
//! - every token prefix (3+ chars) maps to the ids that contain it
//! - query tokens are AND-ed, each token OR-ed with its thesaurus synonyms
//! - literal containment is re-checked, the index only proves prefixes
//! - results are memoized per (filter, sort, normalized query)

mod prefs;
mod text;
mod thesaurus;

pub use prefs::{PreferenceStore, Preferences};
pub use text::{compare_names, depluralize, normalize, tokenize};
pub use thesaurus::{KeywordMap, Thesaurus};

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SearchConfig;

/// Ordinal of an asset within one archive generation
pub type AssetId = usize;

/// One indexed media entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    /// Base file name, e.g. `Acme.svg`
    pub name: String,
    /// Lowercase extension without the dot
    pub extension: String,
    pub keywords: Vec<String>,
    /// Normalized name + stem + keywords
    pub search_text: String,
    pub has_keywords: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
}

impl Asset {
    pub fn new(id: AssetId, name: impl Into<String>, keywords: Vec<String>) -> Self {
        let name = name.into();
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        let has_keywords = keywords.iter().any(|k| !k.trim().is_empty());

        let mut raw = String::with_capacity(name.len() * 2);
        raw.push_str(&name);
        raw.push(' ');
        raw.push_str(stem(&name));
        for keyword in &keywords {
            raw.push(' ');
            raw.push_str(keyword);
        }

        Self {
            id,
            name,
            extension,
            keywords,
            search_text: normalize(&raw),
            has_keywords,
            last_used_at: None,
            is_favorite: false,
        }
    }

    /// Name without its extension
    pub fn stem(&self) -> &str {
        stem(&self.name)
    }
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// Tri-state keyword presence filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Any,
    WithKeywords,
    WithoutKeywords,
}

impl FilterMode {
    fn accepts(self, asset: &Asset) -> bool {
        match self {
            FilterMode::Any => true,
            FilterMode::WithKeywords => asset.has_keywords,
            FilterMode::WithoutKeywords => !asset.has_keywords,
        }
    }
}

/// Secondary order, used for ties and for the empty query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortMode {
    #[default]
    Name,
    Recent,
    Favorites,
}

impl SortMode {
    fn compare(self, a: &Asset, b: &Asset) -> Ordering {
        let primary = match self {
            SortMode::Name => Ordering::Equal,
            // Most recent first, never-used last
            SortMode::Recent => b.last_used_at.cmp(&a.last_used_at),
            SortMode::Favorites => b.is_favorite.cmp(&a.is_favorite),
        };
        primary.then_with(|| compare_names(&a.name, &b.name))
    }
}

/// A ranked query result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub asset: Arc<Asset>,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    filter: FilterMode,
    sort: SortMode,
    query: String,
}

/// One query token and the synonyms that may stand in for it
#[derive(Debug)]
struct TokenGroup {
    literal: String,
    synonyms: Vec<String>,
}

/// Statistics about the current index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub assets: usize,
    pub with_keywords: usize,
    pub favorites: usize,
    pub prefixes: usize,
    pub cached_queries: usize,
}

/// In-memory prefix index over one archive generation
pub struct SearchIndex {
    assets: Vec<Arc<Asset>>,
    by_name: HashMap<String, AssetId>,
    prefixes: HashMap<String, HashSet<AssetId>>,
    thesaurus: Arc<Thesaurus>,
    config: SearchConfig,
    cache: Mutex<QueryCache>,
}

#[derive(Default)]
struct QueryCache {
    entries: HashMap<QueryKey, Arc<[SearchHit]>>,
    last_sort: Option<SortMode>,
}

impl SearchIndex {
    /// Build the index. Asset ids must equal their position in `assets`.
    pub fn build(assets: Vec<Asset>, thesaurus: Arc<Thesaurus>, config: SearchConfig) -> Self {
        let min_prefix = config.min_prefix.max(1);

        let per_asset: Vec<(AssetId, Vec<String>)> = assets
            .par_iter()
            .map(|asset| {
                let mut keys: Vec<String> = asset
                    .search_text
                    .split_whitespace()
                    .flat_map(|token| prefixes_of(token, min_prefix))
                    .collect();
                keys.sort_unstable();
                keys.dedup();
                (asset.id, keys)
            })
            .collect();

        let mut prefixes: HashMap<String, HashSet<AssetId>> = HashMap::new();
        for (id, keys) in per_asset {
            for key in keys {
                prefixes.entry(key).or_default().insert(id);
            }
        }

        let by_name = assets.iter().map(|a| (a.name.clone(), a.id)).collect();

        info!(
            "Search index built: {} assets, {} prefixes",
            assets.len(),
            prefixes.len()
        );

        Self {
            assets: assets.into_iter().map(Arc::new).collect(),
            by_name,
            prefixes,
            thesaurus,
            config,
            cache: Mutex::new(QueryCache::default()),
        }
    }

    pub fn empty(thesaurus: Arc<Thesaurus>, config: SearchConfig) -> Self {
        Self::build(Vec::new(), thesaurus, config)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[Arc<Asset>] {
        &self.assets
    }

    pub fn get(&self, id: AssetId) -> Option<&Arc<Asset>> {
        self.assets.get(id)
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Asset>> {
        self.by_name.get(name).and_then(|&id| self.assets.get(id))
    }

    pub fn thesaurus(&self) -> &Arc<Thesaurus> {
        &self.thesaurus
    }

    /// Run a query. Identical calls without an intervening mutation return
    /// the same memoized result.
    pub fn query(&self, text: &str, filter: FilterMode, sort: SortMode) -> Arc<[SearchHit]> {
        let key = QueryKey {
            filter,
            sort,
            query: normalize(text),
        };

        {
            let mut cache = self.cache.lock();
            if cache.last_sort != Some(sort) {
                cache.entries.clear();
                cache.last_sort = Some(sort);
            }
            if let Some(hit) = cache.entries.get(&key) {
                debug!("Query cache hit: {:?}", key.query);
                return Arc::clone(hit);
            }
        }

        let hits: Arc<[SearchHit]> = self.execute(&key).into();

        let mut cache = self.cache.lock();
        if cache.entries.len() >= self.config.cache_limit.max(1) {
            debug!("Query cache full ({} entries), clearing", cache.entries.len());
            cache.entries.clear();
        }
        cache.entries.insert(key, Arc::clone(&hits));
        hits
    }

    fn execute(&self, key: &QueryKey) -> Vec<SearchHit> {
        if key.query.is_empty() {
            let mut hits: Vec<SearchHit> = self
                .assets
                .iter()
                .filter(|a| key.filter.accepts(a))
                .map(|a| SearchHit {
                    asset: Arc::clone(a),
                    score: 0,
                })
                .collect();
            hits.sort_by(|x, y| key.sort.compare(&x.asset, &y.asset));
            return hits;
        }

        let groups = self.expand(&key.query);
        if groups.is_empty() {
            return Vec::new();
        }

        let mut sets = Vec::with_capacity(groups.len());
        for group in &groups {
            let set = self.group_candidates(group);
            if set.is_empty() {
                return Vec::new();
            }
            sets.push(set);
        }
        sets.sort_by_key(HashSet::len);

        let Some((first, rest)) = sets.split_first() else {
            return Vec::new();
        };
        let candidates = first
            .iter()
            .copied()
            .filter(|id| rest.iter().all(|set| set.contains(id)));

        let mut hits: Vec<SearchHit> = candidates
            .filter_map(|id| {
                let asset = self.assets.get(id)?;
                let score = self.score(asset, &groups)?;
                key.filter.accepts(asset).then(|| SearchHit {
                    asset: Arc::clone(asset),
                    score,
                })
            })
            .collect();

        hits.sort_by(|x, y| {
            y.score
                .cmp(&x.score)
                .then_with(|| key.sort.compare(&x.asset, &y.asset))
        });
        hits
    }

    fn expand(&self, query: &str) -> Vec<TokenGroup> {
        let mut seen = HashSet::new();
        query
            .split_whitespace()
            .filter(|token| seen.insert(*token))
            .map(|token| TokenGroup {
                literal: token.to_string(),
                synonyms: self.thesaurus.related(token, self.config.max_synonyms),
            })
            .collect()
    }

    /// Ids that may match a group: literal prefix set OR any synonym's set
    fn group_candidates(&self, group: &TokenGroup) -> HashSet<AssetId> {
        let mut ids: HashSet<AssetId> = self
            .prefixes
            .get(&group.literal)
            .cloned()
            .unwrap_or_default();
        for synonym in &group.synonyms {
            if let Some(set) = self.phrase_candidates(synonym) {
                ids.extend(set);
            }
        }
        ids
    }

    /// Multi-word synonyms need every word's prefix set
    fn phrase_candidates(&self, phrase: &str) -> Option<HashSet<AssetId>> {
        let mut sets: Vec<&HashSet<AssetId>> = phrase
            .split_whitespace()
            .map(|word| self.prefixes.get(word))
            .collect::<Option<_>>()?;
        sets.sort_by_key(|s| s.len());
        let (first, rest) = sets.split_first()?;
        Some(
            first
                .iter()
                .copied()
                .filter(|id| rest.iter().all(|s| s.contains(id)))
                .collect(),
        )
    }

    /// `None` when some group has neither its literal nor a synonym in the text
    fn score(&self, asset: &Asset, groups: &[TokenGroup]) -> Option<u32> {
        let text = asset.search_text.as_str();
        let mut direct = 0u32;
        let mut synonyms: HashSet<&str> = HashSet::new();

        for group in groups {
            let literal = text.contains(group.literal.as_str());
            let mut any_synonym = false;
            for synonym in &group.synonyms {
                if text.contains(synonym.as_str()) {
                    synonyms.insert(synonym.as_str());
                    any_synonym = true;
                }
            }
            if !literal && !any_synonym {
                return None;
            }
            direct += literal as u32;
        }

        Some(
            direct * self.config.direct_weight
                + synonyms.len() as u32 * self.config.synonym_weight,
        )
    }

    /// Flag or unflag a favorite; returns false when the name is unknown
    pub fn set_favorite(&mut self, name: &str, favorite: bool) -> bool {
        self.update(name, |asset| asset.is_favorite = favorite)
    }

    pub fn set_last_used(&mut self, name: &str, at: DateTime<Utc>) -> bool {
        self.update(name, |asset| asset.last_used_at = Some(at))
    }

    fn update(&mut self, name: &str, f: impl FnOnce(&mut Asset)) -> bool {
        let Some(&id) = self.by_name.get(name) else {
            return false;
        };
        f(Arc::make_mut(&mut self.assets[id]));
        self.clear_cache();
        true
    }

    pub fn clear_cache(&self) {
        self.cache.lock().entries.clear();
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            assets: self.assets.len(),
            with_keywords: self.assets.iter().filter(|a| a.has_keywords).count(),
            favorites: self.assets.iter().filter(|a| a.is_favorite).count(),
            prefixes: self.prefixes.len(),
            cached_queries: self.cache.lock().entries.len(),
        }
    }
}

/// Index keys for one token: verbatim when short, else every prefix from `min` chars
fn prefixes_of(token: &str, min: usize) -> Vec<String> {
    let boundaries: Vec<usize> = token
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .chain(std::iter::once(token.len()))
        .collect();

    if boundaries.len() <= min {
        return vec![token.to_string()];
    }
    boundaries[min - 1..]
        .iter()
        .map(|&end| token[..end].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(entries: &[(&str, &[&str])], thesaurus: Thesaurus) -> SearchIndex {
        let assets = entries
            .iter()
            .enumerate()
            .map(|(id, (name, keywords))| {
                Asset::new(id, *name, keywords.iter().map(|k| k.to_string()).collect())
            })
            .collect();
        SearchIndex::build(assets, Arc::new(thesaurus), SearchConfig::default())
    }

    fn names(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.asset.name.as_str()).collect()
    }

    #[test]
    fn test_prefixes_of() {
        assert_eq!(prefixes_of("ab", 3), vec!["ab"]);
        assert_eq!(prefixes_of("abc", 3), vec!["abc"]);
        assert_eq!(prefixes_of("cloud", 3), vec!["clo", "clou", "cloud"]);
        assert_eq!(prefixes_of("ærøs", 3), vec!["ærø", "ærøs"]);
    }

    #[test]
    fn test_asset_search_text() {
        let asset = Asset::new(0, "Acme-Rocket.SVG", vec!["Space Ship".into()]);
        assert_eq!(asset.extension, "svg");
        assert_eq!(asset.stem(), "Acme-Rocket");
        assert_eq!(asset.search_text, "acme rocket svg acme rocket space ship");
        assert!(asset.has_keywords);
    }

    #[test]
    fn test_empty_query_returns_all_sorted() {
        let index = index_of(&[("beta.svg", &[]), ("Alpha.svg", &[]), ("gamma.svg", &[])], Thesaurus::default());
        let hits = index.query("   ", FilterMode::Any, SortMode::Name);
        assert_eq!(names(&hits), vec!["Alpha.svg", "beta.svg", "gamma.svg"]);
    }

    #[test]
    fn test_prefix_and_semantics() {
        let index = index_of(
            &[
                ("Cloud-Storage.svg", &[]),
                ("Cloudy-Day.svg", &["weather"]),
                ("Storage-Box.svg", &[]),
            ],
            Thesaurus::default(),
        );

        assert_eq!(
            names(&index.query("clou", FilterMode::Any, SortMode::Name)),
            vec!["Cloud-Storage.svg", "Cloudy-Day.svg"]
        );
        assert_eq!(
            names(&index.query("cloud stor", FilterMode::Any, SortMode::Name)),
            vec!["Cloud-Storage.svg"]
        );
        assert!(index.query("cloud zebra", FilterMode::Any, SortMode::Name).is_empty());
        assert_eq!(
            names(&index.query("WEATHER", FilterMode::Any, SortMode::Name)),
            vec!["Cloudy-Day.svg"]
        );
    }

    #[test]
    fn test_synonym_ranks_below_literal() {
        let index = index_of(
            &[("Blue-Sky.svg", &["sky"]), ("Cloud.svg", &[]), ("Tree.svg", &[])],
            Thesaurus::new([("cloud", vec!["sky"])]),
        );
        let hits = index.query("cloud", FilterMode::Any, SortMode::Name);

        assert_eq!(names(&hits), vec!["Cloud.svg", "Blue-Sky.svg"]);
        assert_eq!(hits[0].score, 100);
        assert_eq!(hits[1].score, 10);
    }

    #[test]
    fn test_plural_query_uses_singular_synonyms() {
        let index = index_of(
            &[("Strawberry.svg", &["fruit"])],
            Thesaurus::new([("berry", vec!["fruit"])]),
        );
        let hits = index.query("berries", FilterMode::Any, SortMode::Name);
        assert_eq!(names(&hits), vec!["Strawberry.svg"]);
    }

    #[test]
    fn test_keyword_filter() {
        let index = index_of(
            &[("Acme.svg", &["rocket"]), ("Acorn.svg", &[])],
            Thesaurus::default(),
        );
        assert_eq!(
            names(&index.query("ac", FilterMode::Any, SortMode::Name)).len(),
            0,
            "two-char tokens only match verbatim short tokens"
        );
        assert_eq!(
            names(&index.query("aco", FilterMode::WithoutKeywords, SortMode::Name)),
            vec!["Acorn.svg"]
        );
        assert_eq!(
            names(&index.query("", FilterMode::WithKeywords, SortMode::Name)),
            vec!["Acme.svg"]
        );
    }

    #[test]
    fn test_favorites_and_recent_sorting() {
        let mut index = index_of(
            &[("Alpha.svg", &[]), ("Beta.svg", &[]), ("Gamma.svg", &[])],
            Thesaurus::default(),
        );
        let before = index.query("", FilterMode::Any, SortMode::Favorites);
        assert_eq!(names(&before)[0], "Alpha.svg");

        assert!(index.set_favorite("Gamma.svg", true));
        let after = index.query("", FilterMode::Any, SortMode::Favorites);
        assert_eq!(names(&after), vec!["Gamma.svg", "Alpha.svg", "Beta.svg"]);

        let now = Utc::now();
        index.set_last_used("Beta.svg", now);
        index.set_last_used("Alpha.svg", now - chrono::Duration::seconds(30));
        let recent = index.query("", FilterMode::Any, SortMode::Recent);
        assert_eq!(names(&recent), vec!["Beta.svg", "Alpha.svg", "Gamma.svg"]);

        assert!(!index.set_favorite("Missing.svg", true));
    }

    #[test]
    fn test_cache_hit_is_identical() {
        let index = index_of(&[("Cloud.svg", &[]), ("Clock.svg", &[])], Thesaurus::default());
        let first = index.query("clo", FilterMode::Any, SortMode::Name);
        let second = index.query("  CLO ", FilterMode::Any, SortMode::Name);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(index.stats().cached_queries, 1);

        // A different sort mode flushes the cache
        index.query("clo", FilterMode::Any, SortMode::Recent);
        assert_eq!(index.stats().cached_queries, 1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let config = SearchConfig {
            cache_limit: 2,
            ..SearchConfig::default()
        };
        let assets = vec![Asset::new(0, "Cloud.svg", vec![])];
        let index = SearchIndex::build(assets, Arc::new(Thesaurus::default()), config);

        index.query("clo", FilterMode::Any, SortMode::Name);
        index.query("clou", FilterMode::Any, SortMode::Name);
        index.query("cloud", FilterMode::Any, SortMode::Name);
        assert_eq!(index.stats().cached_queries, 1);
    }
}
