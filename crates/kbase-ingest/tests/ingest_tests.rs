use std::fs;
use std::path::Path;
use std::sync::Arc;

use kbase_core::chunker::{ChunkingConfig, TextSplitter};
use kbase_core::config::Settings;
use kbase_core::loader::{load_knowledge_base, CONVERSATIONS_FILE, FAQ_FILE, PRODUCT_CATALOG_FILE, TECH_DOCS_FILE};
use kbase_core::types::MetaValue;
use kbase_embed::HashingEmbedder;
use kbase_ingest::sources::{conversation_records, product_records, technical_records};
use kbase_ingest::{connect_vector_backend, DataManager, COLLECTION_NAMES, CONVERSATIONS, PRODUCTS, TECHNICAL};
use kbase_vector::LanceStore;
use serde_json::json;
use tempfile::TempDir;

fn write_fixture(dir: &Path) {
    let catalog = json!({
        "products": [{
            "id": "P1",
            "name": "Starter",
            "description": "Entry plan for small teams",
            "price": {"monthly": 10, "annual": 100},
            "features": [{"name": "Storage", "description": "10 GB of cloud storage"}],
            "limitations": ["No phone support"],
            "target_audience": "Freelancers"
        }],
        "addons": [{"id": "A1", "name": "Backup", "description": "Nightly backups", "price": 5}],
        "bundles": [{
            "id": "B1",
            "name": "Team Pack",
            "description": "Starter plus Backup",
            "included_products": ["P1", "A1"],
            "price": {"monthly": 14, "annual": 140, "saving_percentage": 10}
        }]
    });
    let faqs = json!({
        "categories": [{
            "name": "Billing",
            "questions": [
                {"question": "How do refunds work?", "answer": "Refunds are issued within 30 days."},
                {"question": "Can I pay yearly?", "answer": "Yes, annual billing is available."}
            ]
        }]
    });
    let docs = "# Admin Guide\nWelcome.\n\n## Installation\nRun the installer and restart the service.\n";
    let conversations = [
        json!({"conversation_id": "C1", "customer_email": "a@example.com", "agent_name": "Sam",
               "messages": [{"role": "customer", "content": "My sync keeps failing"},
                            {"role": "agent", "content": "Please reinstall the client"}]}),
        json!({"conversation_id": 2, "customer_email": "b@example.com", "agent_name": "Kim", "messages": []}),
    ];
    fs::write(dir.join(PRODUCT_CATALOG_FILE), catalog.to_string()).expect("catalog");
    fs::write(dir.join(FAQ_FILE), faqs.to_string()).expect("faqs");
    fs::write(dir.join(TECH_DOCS_FILE), docs).expect("docs");
    let jsonl: Vec<String> = conversations.iter().map(|c| c.to_string()).collect();
    fs::write(dir.join(CONVERSATIONS_FILE), jsonl.join("\n\n")).expect("conversations");
}

fn splitter() -> TextSplitter {
    TextSplitter::new(ChunkingConfig::default()).expect("splitter")
}

fn str_meta<'a>(meta: &'a kbase_core::types::Meta, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(MetaValue::as_str)
}

#[test]
fn product_records_follow_id_and_metadata_conventions() {
    let tmp = TempDir::new().expect("tmp");
    write_fixture(tmp.path());
    let kb = load_knowledge_base(tmp.path()).expect("kb");
    let records = product_records(&kb.product_catalog, &kb.faqs, &splitter());

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["product-P1-0", "addon-A1-0", "bundle-B1-0", "faq-0-0-0", "faq-0-1-0"]);

    let product = &records[0];
    assert!(product.document.starts_with("Product: Starter\nID: P1"));
    assert!(product.document.contains("Monthly: $10"));
    assert!(product.document.contains("- Storage: 10 GB of cloud storage"));
    assert!(product.document.contains("- No phone support"));
    assert_eq!(str_meta(&product.metadata, "type"), Some("product"));
    assert_eq!(str_meta(&product.metadata, "product_name"), Some("Starter"));
    assert_eq!(str_meta(&product.metadata, "chunk"), Some("0-0"));

    let addon = &records[1];
    assert!(addon.document.contains("Price: $5"));
    assert!(addon.document.contains("Details: No additional details"));

    let bundle = &records[2];
    assert!(bundle.document.contains("Included Products: P1, A1"));
    assert!(bundle.document.contains("Savings: 10%"));

    let faq = &records[4];
    assert_eq!(faq.document, "Category: Billing\nQuestion: Can I pay yearly?\nAnswer: Yes, annual billing is available.");
    assert_eq!(str_meta(&faq.metadata, "category"), Some("Billing"));
    assert_eq!(str_meta(&faq.metadata, "chunk"), Some("0-1-0"));
}

#[test]
fn technical_and_conversation_records() {
    let tmp = TempDir::new().expect("tmp");
    write_fixture(tmp.path());
    let kb = load_knowledge_base(tmp.path()).expect("kb");

    let tech = technical_records(&kb.tech_docs, &splitter());
    assert_eq!(tech.len(), 1);
    assert_eq!(tech[0].id, "tech-0");
    assert_eq!(str_meta(&tech[0].metadata, "type"), Some("technical_doc"));
    assert_eq!(str_meta(&tech[0].metadata, "section"), Some("Installation"));

    let conv = conversation_records(&kb.customer_conversations, &splitter());
    let ids: Vec<&str> = conv.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["conv-C1-0", "conv-2-0"]);
    assert!(conv[0].document.contains("Customer: My sync keeps failing"));
    assert!(conv[0].document.contains("Agent: Please reinstall the client"));
    assert_eq!(str_meta(&conv[1].metadata, "agent_name"), Some("Kim"));
    assert_eq!(str_meta(&conv[1].metadata, "chunk"), Some("1-0"));
}

#[test]
fn without_backend_collections_are_lexical() {
    let tmp = TempDir::new().expect("tmp");
    write_fixture(tmp.path());
    let manager = DataManager::new(tmp.path(), splitter(), None);
    assert!(!manager.uses_vector_store());

    let collections = manager.ingest().expect("collections");
    let names: Vec<&str> = collections.iter().map(|c| c.name()).collect();
    assert_eq!(names, COLLECTION_NAMES);
    assert_eq!(collections.get(PRODUCTS).expect("products").count().expect("count"), 5);
    assert_eq!(collections.get(TECHNICAL).expect("technical").count().expect("count"), 1);
    assert_eq!(collections.get(CONVERSATIONS).expect("conv").count().expect("count"), 2);
    assert!(collections.get("songs").is_none());

    let hits = collections.products.query(&["How do refunds work?"], 1).expect("query");
    assert_eq!(hits.ids(), ["faq-0-0-0"]);
    let hits = collections.conversations.query(&["sync failing"], 1).expect("query");
    assert_eq!(hits.ids(), ["conv-C1-0"]);
}

#[test]
fn missing_data_file_is_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let manager = DataManager::new(tmp.path(), splitter(), None);
    assert!(manager.ingest().is_err());
}

#[test]
fn vector_backend_is_populated_once() {
    let data = TempDir::new().expect("data");
    write_fixture(data.path());
    let db = TempDir::new().expect("db");

    let open = || LanceStore::open(db.path(), Arc::new(HashingEmbedder::new(64))).expect("store");
    let manager = DataManager::new(data.path(), splitter(), Some(open()));
    assert!(manager.uses_vector_store());
    let first = manager.ingest().expect("first ingest");
    assert_eq!(first.products.count().expect("count"), 5);
    drop(first);
    drop(manager);

    let manager = DataManager::new(data.path(), splitter(), Some(open()));
    let second = manager.ingest().expect("second ingest");
    assert_eq!(second.products.count().expect("count"), 5, "populated collection is not re-added");
    assert_eq!(second.technical.count().expect("count"), 1);
    let hits = second.products.query(&["Refunds are issued within 30 days"], 5).expect("query");
    assert_eq!(hits.len(), 5);
}

#[test]
fn connect_with_fake_embeddings() {
    let db = TempDir::new().expect("db");
    let mut settings = Settings::default();
    settings.embed.use_fake = true;
    settings.embed.dim = 32;
    settings.store.db_dir = db.path().to_string_lossy().to_string();
    let store = connect_vector_backend(&settings).expect("store");
    assert_eq!(store.embedder().dim(), 32);
}

#[test]
fn missing_model_falls_back_to_none() {
    let db = TempDir::new().expect("db");
    let mut settings = Settings::default();
    settings.embed.model_dir = db.path().join("no-such-model").to_string_lossy().to_string();
    settings.store.db_dir = db.path().join("store").to_string_lossy().to_string();
    if std::env::var_os("APP_USE_FAKE_EMBEDDINGS").is_none() && std::env::var_os("APP_MODEL_DIR").is_none() {
        assert!(connect_vector_backend(&settings).is_none());
    }
}

#[test]
fn manager_from_settings_uses_configured_dir_and_chunking() {
    let tmp = TempDir::new().expect("tmp");
    write_fixture(tmp.path());
    let mut settings = Settings::default();
    settings.data.dir = tmp.path().to_string_lossy().to_string();
    settings.chunking = ChunkingConfig { chunk_size: 40, chunk_overlap: 0 };
    let manager = DataManager::from_settings(&settings, None).expect("manager");
    assert_eq!(manager.data_dir(), tmp.path());

    let kb = manager.load_knowledge_base().expect("kb");
    assert_eq!(kb.customer_conversations.len(), 2);
    let collections = manager.prepare_collections(&kb).expect("collections");
    assert!(collections.technical.count().expect("count") > 1, "small chunks split the docs");

    settings.chunking = ChunkingConfig { chunk_size: 10, chunk_overlap: 20 };
    assert!(DataManager::from_settings(&settings, None).is_err());
}

#[test]
fn products_without_ids_still_ingest_lexically() {
    let tmp = TempDir::new().expect("tmp");
    write_fixture(tmp.path());
    let catalog = json!({"products": [{"name": "Starter"}, {"name": "Pro", "description": null}]});
    fs::write(tmp.path().join(PRODUCT_CATALOG_FILE), catalog.to_string()).expect("catalog");

    let collections = DataManager::new(tmp.path(), splitter(), None).ingest().expect("collections");
    let hits = collections.products.query(&["Pro"], 4).expect("query");
    assert_eq!(&hits.ids()[..2], ["product--0", "product--0"]);
    assert!(hits.documents()[0].starts_with("Product: Pro"));
}
