use crate::core::error::Result;
use crate::search::embedder::Embedder;
use crate::search::query::{ParsedQuery, QueryParser};
use crate::storage::files::MetadataStore;
use crate::storage::record::FileRecord;
use crate::storage::vectors::{Candidates, EmbeddingIndex};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Retrieval strategy for a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exact,
    Fuzzy,
    Metadata,
    Semantic,
}

impl Strategy {
    /// Map a strategy name to a strategy; unknown names fall back to fuzzy.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "exact" => Strategy::Exact,
            "metadata" => Strategy::Metadata,
            "semantic" => Strategy::Semantic,
            _ => Strategy::Fuzzy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::Fuzzy => "fuzzy",
            Strategy::Metadata => "metadata",
            Strategy::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a hit was ranked
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    /// Ordered by modification time only
    None,
    /// Fuzzy token occurrence count
    Score(u32),
    /// Cosine similarity to the query embedding
    Similarity(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: FileRecord,
    pub relevance: Relevance,
}

impl SearchHit {
    fn unranked(record: FileRecord) -> Self {
        Self {
            record,
            relevance: Relevance::None,
        }
    }
}

/// Runs queries against the metadata store and, when an embedder is present,
/// the embedding index.
pub struct SearchEngine {
    store: MetadataStore,
    vectors: EmbeddingIndex,
    embedder: Option<Arc<dyn Embedder>>,
    parser: QueryParser,
}

impl SearchEngine {
    pub fn new(
        store: MetadataStore,
        vectors: EmbeddingIndex,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            store,
            vectors,
            embedder,
            parser: QueryParser::new(),
        }
    }

    pub fn parser(&self) -> &QueryParser {
        &self.parser
    }

    pub fn search(&self, query: &str, strategy: Strategy, limit: usize) -> Result<Vec<SearchHit>> {
        let parsed = self.parser.parse(query);
        self.search_parsed(query, &parsed, strategy, limit)
    }

    /// Run `strategy` with constraints already extracted from `query`.
    pub fn search_parsed(
        &self,
        query: &str,
        parsed: &ParsedQuery,
        strategy: Strategy,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        debug!(
            strategy = strategy.as_str(),
            time = ?parsed.time,
            size = ?parsed.size,
            residual = %parsed.residual,
            "Running search"
        );

        match strategy {
            Strategy::Exact if parsed.has_constraints() => self.metadata(parsed, limit),
            Strategy::Exact => self.exact(query, limit),
            Strategy::Metadata => self.metadata(parsed, limit),
            Strategy::Fuzzy => self.fuzzy(parsed, limit),
            Strategy::Semantic => match &self.embedder {
                Some(embedder) => self.semantic(embedder.as_ref(), query, parsed, limit),
                None => self.metadata(parsed, limit),
            },
        }
    }

    fn exact(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let needle = query.trim().to_lowercase();
        let records = self.store.scan(|r| matches_name_or_path(r, &needle))?;
        Ok(newest_first(records, limit))
    }

    fn metadata(&self, parsed: &ParsedQuery, limit: usize) -> Result<Vec<SearchHit>> {
        let records = self.store.scan(|r| {
            parsed.admits(r) && (parsed.residual.is_empty() || matches_name_or_path(r, &parsed.residual))
        })?;
        Ok(newest_first(records, limit))
    }

    fn fuzzy(&self, parsed: &ParsedQuery, limit: usize) -> Result<Vec<SearchHit>> {
        let candidates = self.store.scan(|r| parsed.admits(r))?;
        if parsed.residual.is_empty() {
            return Ok(newest_first(candidates, limit));
        }

        let tokens: Vec<&str> = parsed.residual.split_whitespace().collect();
        let mut scored: Vec<(u32, FileRecord)> = candidates
            .into_iter()
            .filter_map(|record| {
                let score = fuzzy_score(&record, &tokens);
                (score > 0).then_some((score, record))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| by_newest(&a.1, &b.1))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, record)| SearchHit {
                record,
                relevance: Relevance::Score(score),
            })
            .collect())
    }

    fn semantic(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        parsed: &ParsedQuery,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let candidates = if parsed.has_constraints() {
            let ids: HashSet<u64> = self
                .store
                .scan(|r| parsed.admits(r))?
                .into_iter()
                .map(|r| r.id)
                .collect();
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            Candidates::Only(ids)
        } else {
            if self.vectors.is_empty()? {
                return Ok(Vec::new());
            }
            Candidates::All
        };

        let query_vector = embedder.embed(query)?;
        let ranked = self.vectors.similarity_search(&candidates, &query_vector, limit)?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<u64> = ranked.iter().map(|(id, _)| *id).collect();
        let similarities: HashMap<u64, f32> = ranked.into_iter().collect();

        let mut hits: Vec<SearchHit> = self
            .store
            .get_many(&ids)?
            .into_iter()
            .map(|record| {
                let similarity = similarities.get(&record.id).copied().unwrap_or(0.0);
                SearchHit {
                    record,
                    relevance: Relevance::Similarity(similarity),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            let sa = similarity_of(a);
            let sb = similarity_of(b);
            sb.partial_cmp(&sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        Ok(hits)
    }
}

/// Sum over tokens of non-overlapping occurrences in `name + " " + parent_directory`.
pub fn fuzzy_score(record: &FileRecord, tokens: &[&str]) -> u32 {
    let searchable = format!("{} {}", record.name, record.parent_directory).to_lowercase();
    tokens
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| searchable.matches(t).count() as u32)
        .sum()
}

fn similarity_of(hit: &SearchHit) -> f32 {
    match hit.relevance {
        Relevance::Similarity(s) => s,
        _ => 0.0,
    }
}

fn by_newest(a: &FileRecord, b: &FileRecord) -> Ordering {
    b.modified_at.partial_cmp(&a.modified_at).unwrap_or(Ordering::Equal)
}

fn newest_first(mut records: Vec<FileRecord>, limit: usize) -> Vec<SearchHit> {
    records.sort_by(|a, b| by_newest(a, b).then_with(|| a.id.cmp(&b.id)));
    records.truncate(limit);
    records.into_iter().map(SearchHit::unranked).collect()
}

fn matches_name_or_path(record: &FileRecord, needle_lower: &str) -> bool {
    contains_case_insensitive(&record.name, needle_lower)
        || contains_case_insensitive(&record.path, needle_lower)
}

/// Case-insensitive contains check (optimized for ASCII, falls back to allocation for Unicode)
fn contains_case_insensitive(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.is_ascii() && needle.is_ascii() {
        let needle_bytes = needle.as_bytes();
        haystack.as_bytes().windows(needle_bytes.len()).any(|window| {
            window
                .iter()
                .zip(needle_bytes.iter())
                .all(|(&b, &n)| b.to_ascii_lowercase() == n.to_ascii_lowercase())
        })
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}
