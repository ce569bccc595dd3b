use crate::types::QueryResult;

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `bert:all-MiniLM-L6-v2:d384`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Read side shared by every collection backend.
///
/// Only the first entry of `query_texts` is used; an empty slice behaves like
/// the empty query. `n_results == 0` yields an empty result.
pub trait QueryableCollection: Send + Sync {
    fn name(&self) -> &str;
    fn count(&self) -> anyhow::Result<usize>;
    fn query(&self, query_texts: &[&str], n_results: usize) -> anyhow::Result<QueryResult>;
}
