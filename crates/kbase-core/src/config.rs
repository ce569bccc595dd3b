//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_CHUNKING__CHUNK_SIZE=800`).
//! `expand_path` expands `~` and `${VAR}` in configured paths.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkingConfig;
use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load settings for the profile named by `RUST_ENV` (default `dev`).
    pub fn load() -> anyhow::Result<Self> {
        Self::load_for_env(&env::var("RUST_ENV").unwrap_or_default())
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let profile = profile_name(env_name);
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"))
            .merge(Toml::file(format!("config.{profile}.toml")))
            .merge(Env::prefixed("APP_").split("__"));
        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub store: StoreSettings,
    pub chunking: ChunkingConfig,
    pub embed: EmbedSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        self.chunking.validate()?;
        if self.embed.dim == 0 {
            return Err(Error::InvalidConfig("embed.dim must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory holding the knowledge-base source files.
    pub dir: String,
}

impl Default for DataSettings {
    fn default() -> Self { Self { dir: "data".to_string() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// LanceDB database directory for the embedding-backed collections.
    pub db_dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self { Self { db_dir: "kbase_db".to_string() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedSettings {
    pub model_dir: String,
    /// Use the deterministic hashing embedder instead of loading a model.
    pub use_fake: bool,
    /// Output dimension of the hashing embedder.
    pub dim: usize,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self { model_dir: "models/all-MiniLM-L6-v2".to_string(), use_fake: false, dim: 384 }
    }
}

/// Canonical profile for `RUST_ENV`; long aliases map to `dev`/`prod`/`test`.
fn profile_name(env_name: &str) -> &str {
    match env_name.trim() {
        "" | "development" => "dev",
        "production" => "prod",
        "testing" => "test",
        other => other,
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
