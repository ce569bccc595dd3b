//! kbase-ingest
//!
//! Loads the support knowledge base, formats and chunks it, and builds the
//! `products`, `technical` and `conversations` collections. The vector store
//! is injected: with one, collections are LanceDB tables; without, they are
//! lexical [`SimpleCollection`]s.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use kbase_core::chunker::TextSplitter;
use kbase_core::config::{expand_path, Settings};
use kbase_core::loader::{load_knowledge_base, KnowledgeBase};
use kbase_core::traits::QueryableCollection;
use kbase_core::types::DocumentRecord;
use kbase_embed::load_embedder;
use kbase_text::SimpleCollection;
use kbase_vector::LanceStore;

pub mod sources;

pub const PRODUCTS: &str = "products";
pub const TECHNICAL: &str = "technical";
pub const CONVERSATIONS: &str = "conversations";
pub const COLLECTION_NAMES: [&str; 3] = [PRODUCTS, TECHNICAL, CONVERSATIONS];

pub struct Collections {
    pub products: Box<dyn QueryableCollection>,
    pub technical: Box<dyn QueryableCollection>,
    pub conversations: Box<dyn QueryableCollection>,
}

impl Collections {
    pub fn get(&self, name: &str) -> Option<&dyn QueryableCollection> {
        match name {
            PRODUCTS => Some(self.products.as_ref()),
            TECHNICAL => Some(self.technical.as_ref()),
            CONVERSATIONS => Some(self.conversations.as_ref()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn QueryableCollection> {
        [self.products.as_ref(), self.technical.as_ref(), self.conversations.as_ref()].into_iter()
    }
}

pub struct DataManager {
    data_dir: PathBuf,
    splitter: TextSplitter,
    store: Option<LanceStore>,
}

impl DataManager {
    pub fn new(data_dir: impl Into<PathBuf>, splitter: TextSplitter, store: Option<LanceStore>) -> Self {
        Self { data_dir: data_dir.into(), splitter, store }
    }

    pub fn from_settings(settings: &Settings, store: Option<LanceStore>) -> Result<Self> {
        let splitter = TextSplitter::new(settings.chunking.clone())?;
        Ok(Self::new(expand_path(&settings.data.dir), splitter, store))
    }

    pub fn data_dir(&self) -> &Path { &self.data_dir }

    pub fn uses_vector_store(&self) -> bool { self.store.is_some() }

    pub fn load_knowledge_base(&self) -> Result<KnowledgeBase> {
        Ok(load_knowledge_base(&self.data_dir)?)
    }

    pub fn prepare_collections(&self, kb: &KnowledgeBase) -> Result<Collections> {
        Ok(Collections {
            products: self.prepare(PRODUCTS, || {
                sources::product_records(&kb.product_catalog, &kb.faqs, &self.splitter)
            })?,
            technical: self.prepare(TECHNICAL, || sources::technical_records(&kb.tech_docs, &self.splitter))?,
            conversations: self.prepare(CONVERSATIONS, || {
                sources::conversation_records(&kb.customer_conversations, &self.splitter)
            })?,
        })
    }

    /// Load the knowledge base and build every collection.
    pub fn ingest(&self) -> Result<Collections> {
        let kb = self.load_knowledge_base()?;
        self.prepare_collections(&kb)
    }

    fn prepare(&self, name: &str, records: impl FnOnce() -> Vec<DocumentRecord>) -> Result<Box<dyn QueryableCollection>> {
        let built = self.build(name, records).with_context(|| format!("Error preparing {name} collection"));
        if let Err(e) = &built {
            error!("{:#}", e);
        }
        built
    }

    fn build(&self, name: &str, records: impl FnOnce() -> Vec<DocumentRecord>) -> Result<Box<dyn QueryableCollection>> {
        let Some(store) = &self.store else {
            info!("Using SimpleCollection for {} (no embedding backend)", name);
            return Ok(Box::new(SimpleCollection::from_records(name, records())));
        };
        let collection = store.get_or_create_collection(name)?;
        if collection.count()? > 0 {
            info!("{} collection already populated, skipping", name);
            return Ok(Box::new(collection));
        }
        let records = records();
        collection.add(&records)?;
        info!("Added {} {} documents to vector database", records.len(), name);
        Ok(Box::new(collection))
    }
}

/// Open the embedding-backed store described by `settings`.
///
/// Returns `None`, after logging why, when the embedder or the database
/// cannot be initialized; callers then fall back to lexical collections.
pub fn connect_vector_backend(settings: &Settings) -> Option<LanceStore> {
    let embedder = match load_embedder(&settings.embed) {
        Ok(e) => Arc::<dyn kbase_core::traits::Embedder>::from(e),
        Err(e) => {
            error!("Failed to initialize embedding function: {:#}", e);
            return None;
        }
    };
    match LanceStore::open(&expand_path(&settings.store.db_dir), embedder) {
        Ok(store) => Some(store),
        Err(e) => {
            error!("Failed to open vector store: {:#}", e);
            None
        }
    }
}
