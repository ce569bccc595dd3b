//! kbase-core
//!
//! Shared domain types, collection/embedder traits, configuration, the
//! recursive text splitter and the knowledge-base source loader.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Embedder, QueryableCollection};
pub use types::{DocumentRecord, Meta, MetaValue, QueryResult};
