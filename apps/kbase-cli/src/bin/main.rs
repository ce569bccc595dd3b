use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use kbase_core::chunker::TextSplitter;
use kbase_core::config::{expand_path, Config, Settings};
use kbase_ingest::{connect_vector_backend, Collections, DataManager, COLLECTION_NAMES};
use kbase_text::DEFAULT_N_RESULTS;

#[derive(Parser)]
#[command(name = "kbase", about = "Build and query the customer-support knowledge base", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the knowledge base and build every collection
    Ingest {
        /// Directory holding the catalog, FAQ, docs and conversation files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Skip the embedding backend and use keyword-overlap collections
        #[arg(long)]
        lexical: bool,
    },

    /// Query one collection
    Query {
        /// products, technical or conversations
        collection: String,

        /// Query text
        text: String,

        /// Number of results
        #[arg(short, default_value_t = DEFAULT_N_RESULTS)]
        n: usize,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        lexical: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn build(settings: &Settings, data_dir: Option<PathBuf>, lexical: bool) -> Result<Collections> {
    let store = if lexical { None } else { connect_vector_backend(settings) };
    let data_dir = data_dir.unwrap_or_else(|| expand_path(&settings.data.dir));
    let splitter = TextSplitter::new(settings.chunking.clone())?;
    let manager = DataManager::new(data_dir, splitter, store);
    info!(data_dir = %manager.data_dir().display(), vector = manager.uses_vector_store(), "preparing collections");
    manager.ingest()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Commands::Ingest { data_dir, lexical } => {
            let collections = build(&settings, data_dir, lexical)?;
            for c in collections.iter() {
                println!("{:<14} {} documents", c.name(), c.count()?);
            }
        }
        Commands::Query { collection, text, n, data_dir, lexical, json } => {
            if !COLLECTION_NAMES.contains(&collection.as_str()) {
                return Err(anyhow!("unknown collection '{collection}', expected one of {COLLECTION_NAMES:?}"));
            }
            let collections = build(&settings, data_dir, lexical)?;
            let target = collections
                .get(&collection)
                .ok_or_else(|| anyhow!("unknown collection '{collection}'"))?;
            let result = target.query(&[text.as_str()], n)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.is_empty() {
                println!("No results.");
            } else {
                for (rank, hit) in result.hits().enumerate() {
                    println!("[{}] {}", rank + 1, hit.id);
                    println!("{}\n", hit.document);
                }
            }
        }
    }
    Ok(())
}
