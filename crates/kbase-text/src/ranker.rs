//! Token-overlap ranking over an in-memory collection.
//!
//! The score of a document for a query is the number of query tokens it
//! contains (each capped at the document's own count) divided by the
//! document's token count. Normalizing by the document length only is
//! intentional: of two documents holding every query token, the shorter one
//! wins.
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use kbase_core::error::{Error, Result};
use kbase_core::traits::QueryableCollection;
use kbase_core::types::{DocumentRecord, Meta, QueryResult};

use crate::tokenize::tokenize;

pub const DEFAULT_N_RESULTS: usize = 3;

/// Token multiset of one text plus its total token count.
#[derive(Debug, Clone, Default)]
struct TermBag {
    counts: HashMap<String, usize>,
    len: usize,
}

impl TermBag {
    fn new(text: &str) -> Self {
        let mut bag = Self::default();
        for token in tokenize(text) {
            *bag.counts.entry(token).or_insert(0) += 1;
            bag.len += 1;
        }
        bag
    }
}

fn overlap_score(query: &TermBag, doc: &TermBag) -> f64 {
    if query.len == 0 || doc.len == 0 {
        return 0.0;
    }
    let overlap: usize = query
        .counts
        .iter()
        .map(|(token, &q)| q.min(doc.counts.get(token).copied().unwrap_or(0)))
        .sum();
    overlap as f64 / doc.len.max(1) as f64
}

/// Overlap of `query` tokens in `document`, normalized by the document's
/// token count. `0.0` when either side has no tokens.
pub fn score(query: &str, document: &str) -> f64 {
    overlap_score(&TermBag::new(query), &TermBag::new(document))
}

/// Immutable lexical collection.
///
/// Built once from aligned documents, metadata and ids; each document's token
/// multiset is computed up front so queries only tokenize the query text.
#[derive(Debug, Clone)]
pub struct SimpleCollection {
    name: String,
    records: Vec<DocumentRecord>,
    bags: Vec<TermBag>,
}

impl SimpleCollection {
    /// Build from three parallel sequences. Fails when their lengths differ.
    pub fn new(name: impl Into<String>, documents: Vec<String>, metadatas: Vec<Meta>, ids: Vec<String>) -> Result<Self> {
        let name = name.into();
        if documents.len() != metadatas.len() || documents.len() != ids.len() {
            return Err(Error::InvalidCollection(format!(
                "{name}: {} documents, {} metadatas and {} ids",
                documents.len(),
                metadatas.len(),
                ids.len()
            )));
        }
        let records = documents
            .into_iter()
            .zip(metadatas)
            .zip(ids)
            .map(|((document, metadata), id)| DocumentRecord { document, metadata, id })
            .collect();
        Ok(Self::from_records(name, records))
    }

    /// Build from whole records. Repeated ids are kept (each record stays
    /// rankable) and reported with a warning.
    pub fn from_records(name: impl Into<String>, records: Vec<DocumentRecord>) -> Self {
        let name = name.into();
        let mut seen = HashSet::with_capacity(records.len());
        let duplicates: Vec<&str> = records.iter().map(|r| r.id.as_str()).filter(|id| !seen.insert(*id)).collect();
        if !duplicates.is_empty() {
            warn!(collection = %name, ?duplicates, "repeated record ids in lexical collection");
        }
        let bags = records.iter().map(|r| TermBag::new(&r.document)).collect();
        info!(collection = %name, documents = records.len(), "built lexical collection");
        Self { name, records, bags }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Every document's `(index, score)` for `query`, best first. Equal
    /// scores keep insertion order.
    pub fn rank(&self, query: &str) -> Vec<(usize, f64)> {
        let q = TermBag::new(query);
        let mut scored: Vec<(usize, f64)> = self.bags.iter().map(|d| overlap_score(&q, d)).enumerate().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored
    }

    /// Top `n_results` documents for the first entry of `query_texts`.
    pub fn query(&self, query_texts: &[&str], n_results: usize) -> QueryResult {
        let query = query_texts.first().copied().unwrap_or("");
        let ranked = self.rank(query);
        let mut out = QueryResult::with_capacity(n_results.min(ranked.len()));
        for &(idx, _) in ranked.iter().take(n_results) {
            let r = &self.records[idx];
            out.push(r.document.as_str(), r.metadata.clone(), r.id.as_str());
        }
        debug!(collection = %self.name, query, n_results, returned = out.len(), top_score = ranked.first().map(|s| s.1), "lexical query");
        out
    }
}

impl QueryableCollection for SimpleCollection {
    fn name(&self) -> &str { Self::name(self) }
    fn count(&self) -> anyhow::Result<usize> { Ok(self.len()) }
    fn query(&self, query_texts: &[&str], n_results: usize) -> anyhow::Result<QueryResult> {
        Ok(Self::query(self, query_texts, n_results))
    }
}
