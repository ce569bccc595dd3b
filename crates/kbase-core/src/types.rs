//! Domain types shared by the lexical and vector collections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type RecordId = String;
pub type Meta = BTreeMap<String, MetaValue>;

/// A scalar metadata value attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self { Self::Str(s.to_string()) }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self { Self::Str(s) }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self { Self::Float(x) }
}

/// One entry of a collection: the text payload, its metadata and a
/// collection-unique identifier.
///
/// Insertion order inside a collection is significant: it is the stable
/// index used to break ranking ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document: String,
    pub metadata: Meta,
    pub id: RecordId,
}

impl DocumentRecord {
    pub fn new(document: impl Into<String>, metadata: Meta, id: impl Into<String>) -> Self {
        Self { document: document.into(), metadata, id: id.into() }
    }
}

/// Ranked output of a single query.
///
/// `documents`, `metadatas` and `ids` are parallel sequences ordered by
/// descending relevance. They can only grow together through [`QueryResult::push`],
/// so index `i` of each always refers to the same record.
///
/// One query string is processed per call, so unlike batched query APIs there
/// is no outer per-query list: the JSON form is
/// `{"documents": [..], "metadatas": [..], "ids": [..]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    documents: Vec<String>,
    metadatas: Vec<Meta>,
    ids: Vec<RecordId>,
}

/// Borrowed view of one aligned row of a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit<'a> {
    pub document: &'a str,
    pub metadata: &'a Meta,
    pub id: &'a str,
}

impl QueryResult {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(n: usize) -> Self {
        Self { documents: Vec::with_capacity(n), metadatas: Vec::with_capacity(n), ids: Vec::with_capacity(n) }
    }

    pub fn push(&mut self, document: impl Into<String>, metadata: Meta, id: impl Into<String>) {
        self.documents.push(document.into());
        self.metadatas.push(metadata);
        self.ids.push(id.into());
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn documents(&self) -> &[String] { &self.documents }

    pub fn metadatas(&self) -> &[Meta] { &self.metadatas }

    pub fn ids(&self) -> &[RecordId] { &self.ids }

    pub fn hits(&self) -> impl Iterator<Item = Hit<'_>> {
        self.documents
            .iter()
            .zip(&self.metadatas)
            .zip(&self.ids)
            .map(|((document, metadata), id)| Hit { document, metadata, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_value_json_shapes() {
        let mut meta = Meta::new();
        meta.insert("type".into(), "faq".into());
        meta.insert("rank".into(), MetaValue::Int(3));
        meta.insert("weight".into(), MetaValue::Float(0.5));
        meta.insert("live".into(), true.into());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"live":true,"rank":3,"type":"faq","weight":0.5}"#);
        let back: Meta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn query_result_rows_stay_aligned() {
        let mut r = QueryResult::new();
        r.push("alpha", Meta::new(), "a");
        r.push("beta", Meta::new(), "b");
        assert_eq!(r.len(), 2);
        assert_eq!(r.documents().len(), r.metadatas().len());
        let ids: Vec<&str> = r.hits().map(|h| h.id).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(r.hits().nth(1).map(|h| h.document), Some("beta"));
    }
}
