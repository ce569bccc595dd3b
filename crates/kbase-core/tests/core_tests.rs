use std::fs;
use tempfile::TempDir;

use kbase_core::chunker::{ChunkingConfig, TextSplitter};
use kbase_core::config::{Config, Settings};
use kbase_core::error::Error;
use kbase_core::loader::{load_knowledge_base, CONVERSATIONS_FILE, FAQ_FILE, PRODUCT_CATALOG_FILE, TECH_DOCS_FILE};

fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
    TextSplitter::new(ChunkingConfig { chunk_size, chunk_overlap }).expect("splitter")
}

#[test]
fn short_text_is_one_trimmed_chunk() {
    let chunks = TextSplitter::new(ChunkingConfig::default()).unwrap().split_text("\n   Product: Basic Plan\n   ");
    assert_eq!(chunks, vec!["Product: Basic Plan"]);
}

#[test]
fn words_merge_with_overlap() {
    let chunks = splitter(10, 4).split_text("aaa bbb ccc ddd");
    assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
}

#[test]
fn markdown_headings_split_first() {
    let chunks = splitter(20, 0).split_text("# Title\nintro\n## Setup\nstep one");
    assert_eq!(chunks, vec!["# Title\nintro", "## Setup\nstep one"]);
}

#[test]
fn unbroken_text_falls_back_to_characters() {
    let chunks = splitter(10, 0).split_text("abcdefghijklmnopqrstuvwxy");
    assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxy"]);
}

#[test]
fn long_text_respects_size_and_carries_overlap() {
    let text: Vec<String> = (0..600).map(|i| format!("w{i}")).collect();
    let text = text.join(" ");
    let chunks = splitter(1000, 200).split_text(&text);
    assert!(chunks.len() >= 3, "got {} chunks", chunks.len());
    for c in &chunks {
        assert!(c.chars().count() <= 1000, "chunk of {} chars", c.chars().count());
    }
    for pair in chunks.windows(2) {
        let head: String = pair[1].chars().take(20).collect();
        assert!(pair[0].contains(&head), "next chunk should start inside the previous one");
    }
    assert!(chunks.last().unwrap().ends_with("w599"));
}

#[test]
fn invalid_chunking_config_is_rejected() {
    let err = TextSplitter::new(ChunkingConfig { chunk_size: 100, chunk_overlap: 200 }).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(TextSplitter::new(ChunkingConfig { chunk_size: 0, chunk_overlap: 0 }).is_err());
}

fn write_knowledge_base(dir: &std::path::Path) {
    fs::write(
        dir.join(PRODUCT_CATALOG_FILE),
        r#"{"products":[{"id":"P1","name":"Basic","price":{"monthly":9.99}}],"addons":[{"id":7,"name":"Backup"}]}"#,
    )
    .unwrap();
    fs::write(dir.join(FAQ_FILE), r#"{"categories":[{"name":"Billing","questions":[{"question":"Refunds?","answer":"Within 30 days."}]}]}"#).unwrap();
    fs::write(dir.join(TECH_DOCS_FILE), "# Guide\n## Install\nRun the installer.").unwrap();
    fs::write(
        dir.join(CONVERSATIONS_FILE),
        "{\"conversation_id\":\"c1\",\"messages\":[{\"role\":\"customer\",\"content\":\"hi\"}]}\n\n   \n{\"conversation_id\":\"c2\"}\n",
    )
    .unwrap();
}

#[test]
fn load_knowledge_base_reads_all_sources() {
    let tmp = TempDir::new().unwrap();
    write_knowledge_base(tmp.path());

    let kb = load_knowledge_base(tmp.path()).expect("load");
    assert_eq!(kb.product_catalog.products.len(), 1);
    assert_eq!(kb.product_catalog.products[0].name, "Basic");
    assert_eq!(kb.product_catalog.addons[0].id, "7", "numeric ids become strings");
    assert!(kb.product_catalog.bundles.is_empty());
    assert_eq!(kb.faqs.categories[0].questions[0].answer, "Within 30 days.");
    assert!(kb.tech_docs.starts_with("# Guide"));
    assert_eq!(kb.customer_conversations.len(), 2, "blank lines are skipped");
    assert_eq!(kb.customer_conversations[0].messages[0].role, "customer");
}

#[test]
fn missing_source_file_is_not_found() {
    let tmp = TempDir::new().unwrap();
    write_knowledge_base(tmp.path());
    fs::remove_file(tmp.path().join(FAQ_FILE)).unwrap();

    let err = load_knowledge_base(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::NotFound(ref p) if p.ends_with(FAQ_FILE)), "got {err}");
}

#[test]
fn malformed_jsonl_reports_line_number() {
    let tmp = TempDir::new().unwrap();
    write_knowledge_base(tmp.path());
    fs::write(tmp.path().join(CONVERSATIONS_FILE), "{\"conversation_id\":\"c1\"}\n\n{not json\n").unwrap();

    let err = load_knowledge_base(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::JsonLine { line: 3, .. }), "got {err}");
}

#[test]
fn null_fields_load_as_defaults() {
    let tmp = TempDir::new().unwrap();
    write_knowledge_base(tmp.path());
    fs::write(
        tmp.path().join(PRODUCT_CATALOG_FILE),
        r#"{"products":[{"id":"P1","name":"Basic","description":null,"limitations":null,"features":null,"price":null,"target_audience":null}],"addons":null,"bundles":[{"id":"B1","included_products":null}]}"#,
    )
    .unwrap();
    fs::write(tmp.path().join(FAQ_FILE), r#"{"categories":[{"name":null,"questions":[{"question":"Refunds?","answer":null}]}]}"#).unwrap();
    fs::write(
        tmp.path().join(CONVERSATIONS_FILE),
        "{\"conversation_id\":null,\"customer_email\":null,\"agent_name\":null,\"messages\":[{\"role\":null,\"content\":\"hi\"}]}\n",
    )
    .unwrap();

    let kb = load_knowledge_base(tmp.path()).expect("null values are tolerated");
    let product = &kb.product_catalog.products[0];
    assert_eq!(product.description, "");
    assert!(product.limitations.is_empty() && product.features.is_empty());
    assert!(product.price.monthly.is_none() && product.target_audience.is_none());
    assert!(kb.product_catalog.addons.is_empty());
    assert!(kb.product_catalog.bundles[0].included_products.is_empty());
    assert_eq!(kb.faqs.categories[0].name, "");
    assert_eq!(kb.faqs.categories[0].questions[0].answer, "");
    let conversation = &kb.customer_conversations[0];
    assert_eq!(conversation.conversation_id, "");
    assert_eq!(conversation.customer_email, "");
    assert_eq!(conversation.messages[0].role, "");
    assert_eq!(conversation.messages[0].content, "hi");
}

#[test]
fn config_defaults_and_overrides() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[data]\ndir = \"kb\"\n[chunking]\nchunk_size = 800\n")?;
        jail.set_env("APP_CHUNKING__CHUNK_OVERLAP", "100");
        jail.set_env("APP_EMBED__USE_FAKE", "true");

        let config = Config::load_for_env("test").expect("config");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.data.dir, "kb");
        assert_eq!(settings.chunking.chunk_size, 800);
        assert_eq!(settings.chunking.chunk_overlap, 100);
        assert!(settings.embed.use_fake);
        assert_eq!(settings.store.db_dir, Settings::default().store.db_dir);
        let size: usize = config.get("chunking.chunk_size").expect("get");
        assert_eq!(size, 800);
        Ok(())
    });
}

#[test]
fn config_rejects_overlap_larger_than_size() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[chunking]\nchunk_size = 50\nchunk_overlap = 60\n")?;
        assert!(Config::load_for_env("test").is_err());
        Ok(())
    });
}
