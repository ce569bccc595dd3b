//! Embedding-backed collections stored as LanceDB tables.
//!
//! Each named collection is one table holding the record id, the document
//! text, its metadata as JSON and the document embedding. The async LanceDB
//! API runs on a runtime owned by the store, so none of these methods may be
//! called from inside another Tokio runtime.
use anyhow::{anyhow, bail, Context, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use kbase_core::traits::{Embedder, QueryableCollection};
use kbase_core::types::{DocumentRecord, Meta, QueryResult};

use crate::schema::{build_collection_schema, vector_dim, DISTANCE_COL, DOCUMENT_COL, ID_COL, METADATA_COL};
use crate::table::{ensure_table, open_db};

const EMBED_BATCH: usize = 256;

pub struct LanceStore {
    rt: Arc<Runtime>,
    db: Connection,
    embedder: Arc<dyn Embedder>,
}

impl LanceStore {
    pub fn open(db_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(db_dir).with_context(|| format!("creating {}", db_dir.display()))?;
        let rt = Arc::new(Runtime::new()?);
        let uri = db_dir.to_string_lossy().to_string();
        let db = rt.block_on(open_db(&uri)).with_context(|| format!("opening LanceDB at {uri}"))?;
        info!(%uri, embedder = embedder.id(), "vector store opened");
        Ok(Self { rt, db, embedder })
    }

    pub fn embedder(&self) -> &dyn Embedder { self.embedder.as_ref() }

    pub fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.rt.block_on(self.db.table_names().execute())?)
    }

    /// Open the named collection, creating an empty one on first use. An
    /// existing table must have been built with the same embedding width.
    pub fn get_or_create_collection(&self, name: &str) -> Result<LanceCollection> {
        let dim = self.embedder.dim();
        let table = self.rt.block_on(ensure_table(&self.db, name, build_collection_schema(dim)))?;
        let schema = self.rt.block_on(table.schema())?;
        match vector_dim(&schema) {
            Some(d) if d == dim => {}
            found => bail!("collection '{name}' stores vectors of width {found:?}, embedder produces {dim}"),
        }
        Ok(LanceCollection { rt: self.rt.clone(), table, name: name.to_string(), embedder: self.embedder.clone() })
    }
}

pub struct LanceCollection {
    rt: Arc<Runtime>,
    table: Table,
    name: String,
    embedder: Arc<dyn Embedder>,
}

impl LanceCollection {
    pub fn name(&self) -> &str { &self.name }

    pub fn count(&self) -> Result<usize> {
        Ok(self.rt.block_on(self.table.count_rows(None))?)
    }

    /// Embed and append `records`. Ids must be unique within the call.
    ///
    /// Every record is embedded before anything is written, so a failed call
    /// leaves the table unchanged.
    pub fn add(&self, records: &[DocumentRecord]) -> Result<()> {
        if records.is_empty() { return Ok(()); }
        let mut seen = HashSet::with_capacity(records.len());
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.id.as_str())) {
            bail!("duplicate id '{}' in batch for collection '{}'", dup.id, self.name);
        }
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message(self.name.clone());
        let embedded = records
            .chunks(EMBED_BATCH)
            .map(|batch| -> Result<RecordBatch> {
                let texts: Vec<String> = batch.iter().map(|r| r.document.clone()).collect();
                let vectors = self.embedder.embed_batch(&texts)?;
                if vectors.len() != batch.len() {
                    bail!("embedder returned {} vectors for {} documents", vectors.len(), batch.len());
                }
                let rb = self.to_record_batch(batch, vectors)?;
                pb.inc(batch.len() as u64);
                Ok(rb)
            })
            .collect::<Result<Vec<RecordBatch>>>();
        let batches = match embedded {
            Ok(b) => b,
            Err(e) => {
                pb.abandon_with_message(format!("{}: embedding failed", self.name));
                return Err(e);
            }
        };
        let schema = build_collection_schema(self.embedder.dim());
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter().map(Ok), schema));
        self.rt.block_on(self.table.add(reader).execute())?;
        pb.finish_and_clear();
        info!(collection = %self.name, documents = records.len(), "added documents to vector store");
        Ok(())
    }

    fn to_record_batch(&self, records: &[DocumentRecord], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let dim = self.embedder.dim();
        let mut ids = Vec::with_capacity(records.len());
        let mut documents = Vec::with_capacity(records.len());
        let mut metadatas = Vec::with_capacity(records.len());
        for r in records {
            ids.push(r.id.as_str());
            documents.push(r.document.as_str());
            metadatas.push(serde_json::to_string(&r.metadata)?);
        }
        let mut rows: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(vectors.len());
        for v in vectors {
            if v.len() != dim { bail!("embedding of width {} does not match {}", v.len(), dim); }
            rows.push(Some(v.into_iter().map(Some).collect()));
        }
        Ok(RecordBatch::try_new(
            build_collection_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(documents)),
                Arc::new(StringArray::from(metadatas)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(rows, dim as i32)),
            ],
        )?)
    }

    /// Nearest documents to the first query text, closest first.
    pub fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResult> {
        if n_results == 0 || self.count()? == 0 {
            return Ok(QueryResult::new());
        }
        let query = query_texts.first().copied().unwrap_or("");
        let vector = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for the query"))?;
        let mut rows: Vec<(f32, String, String, Meta)> = Vec::new();
        self.rt.block_on(async {
            let mut stream = self.table.vector_search(vector)?.limit(n_results).execute().await?;
            while let Some(batch) = stream.try_next().await? {
                let ids = string_col(&batch, ID_COL)?;
                let docs = string_col(&batch, DOCUMENT_COL)?;
                let metas = string_col(&batch, METADATA_COL)?;
                let dist = batch
                    .column_by_name(DISTANCE_COL)
                    .and_then(|c| c.as_any().downcast_ref::<Float32Array>());
                for i in 0..batch.num_rows() {
                    let d = dist.map_or(0.0, |c| c.value(i));
                    let meta: Meta = serde_json::from_str(metas.value(i))?;
                    rows.push((d, docs.value(i).to_string(), ids.value(i).to_string(), meta));
                }
            }
            anyhow::Ok(())
        })?;
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        rows.truncate(n_results);
        debug!(collection = %self.name, query, n_results, returned = rows.len(), "vector query");
        let mut out = QueryResult::with_capacity(rows.len());
        for (_, document, id, meta) in rows {
            out.push(document, meta, id);
        }
        Ok(out)
    }
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .filter(|c| c.null_count() == 0)
        .ok_or_else(|| anyhow!("column '{name}' missing from search results"))
}

impl QueryableCollection for LanceCollection {
    fn name(&self) -> &str { Self::name(self) }
    fn count(&self) -> Result<usize> { Self::count(self) }
    fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResult> {
        Self::query(self, query_texts, n_results)
    }
}
