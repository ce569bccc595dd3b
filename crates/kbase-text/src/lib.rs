//! kbase-text
//!
//! Lexical fallback retrieval: a word tokenizer, a token-overlap score and the
//! in-memory `SimpleCollection` used when no embedding backend is configured.
pub mod ranker;
pub mod tokenize;

pub use ranker::{score, SimpleCollection, DEFAULT_N_RESULTS};
pub use tokenize::{tokenize, Tokens};
