//! Knowledge-base source loader.
//!
//! Reads the four source files of a support knowledge base from a data
//! directory into typed structures. Every field is optional in the source
//! files; missing or `null` values fall back to their defaults.
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{Error, Result};

pub const PRODUCT_CATALOG_FILE: &str = "product_catalog.json";
pub const FAQ_FILE: &str = "faq.json";
pub const TECH_DOCS_FILE: &str = "tech_documentation.md";
pub const CONVERSATIONS_FILE: &str = "customer_conversations.jsonl";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductCatalog {
    #[serde(deserialize_with = "null_as_default")]
    pub products: Vec<Product>,
    #[serde(deserialize_with = "null_as_default")]
    pub addons: Vec<Addon>,
    #[serde(deserialize_with = "null_as_default")]
    pub bundles: Vec<Bundle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Price {
    pub monthly: Option<Value>,
    pub annual: Option<Value>,
    pub saving_percentage: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Product {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub price: Price,
    #[serde(deserialize_with = "null_as_default")]
    pub features: Vec<Feature>,
    #[serde(deserialize_with = "null_as_default")]
    pub limitations: Vec<String>,
    pub target_audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Addon {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub price: Option<Value>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Bundle {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub included_products: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub price: Price,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Faq {
    #[serde(deserialize_with = "null_as_default")]
    pub categories: Vec<FaqCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FaqCategory {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub questions: Vec<FaqEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FaqEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(deserialize_with = "null_as_default")]
    pub answer: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Conversation {
    #[serde(deserialize_with = "lenient_string")]
    pub conversation_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub customer_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub agent_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
}

/// Everything the ingestion layer turns into collections.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    pub product_catalog: ProductCatalog,
    pub faqs: Faq,
    pub tech_docs: String,
    pub customer_conversations: Vec<Conversation>,
}

pub fn load_knowledge_base(data_dir: &Path) -> Result<KnowledgeBase> {
    let loaded = (|| -> Result<KnowledgeBase> {
        Ok(KnowledgeBase {
            product_catalog: read_json(&data_dir.join(PRODUCT_CATALOG_FILE))?,
            faqs: read_json(&data_dir.join(FAQ_FILE))?,
            tech_docs: read_text(&data_dir.join(TECH_DOCS_FILE))?,
            customer_conversations: read_jsonl(&data_dir.join(CONVERSATIONS_FILE))?,
        })
    })();
    match &loaded {
        Ok(kb) => info!(
            dir = %data_dir.display(),
            products = kb.product_catalog.products.len(),
            faq_categories = kb.faqs.categories.len(),
            conversations = kb.customer_conversations.len(),
            "Knowledge base loaded successfully"
        ),
        Err(e) => error!("Failed to load knowledge base: {}", e),
    }
    loaded
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| io_error(path, source))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw).map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

/// One JSON object per line; blank lines are skipped.
fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = read_text(path)?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| Error::JsonLine { path: path.to_path_buf(), line: i + 1, source })
        })
        .collect()
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    if source.kind() == std::io::ErrorKind::NotFound {
        return Error::NotFound(path.display().to_string());
    }
    Error::Io { path: PathBuf::from(path), source }
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept identifiers written either as strings or as bare numbers.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Render an optional JSON scalar for display, `N/A` when absent.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
