//! kbase-vector
//!
//! LanceDB-backed collections. Documents are embedded with an injected
//! [`Embedder`](kbase_core::traits::Embedder) and queried by nearest-neighbour
//! search through the same `QueryableCollection` contract as the lexical
//! fallback.
pub mod schema;
pub mod store;
pub mod table;

pub use store::{LanceCollection, LanceStore};
