//! Application configuration for brandlex.
//!
//! User config lives at `~/.brandlex/brandlex.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BrandlexError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "brandlex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".brandlex";

// ---------------------------------------------------------------------------
// Config structs (matching brandlex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Completion service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Prompt template and per-unit suffixes.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Brand name → Wikipedia article URL, used by `fetch`.
    #[serde(default = "default_brands")]
    pub brands: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            openai: OpenAiConfig::default(),
            prompt: PromptConfig::default(),
            brands: default_brands(),
        }
    }
}

fn default_brands() -> BTreeMap<String, String> {
    [
        ("Cisco", "https://en.wikipedia.org/wiki/Cisco_Systems"),
        ("H3C", "https://en.wikipedia.org/wiki/H3C_Technologies"),
        ("HP", "https://en.wikipedia.org/wiki/HP_Inc."),
        ("Huawei", "https://en.wikipedia.org/wiki/Huawei"),
        ("Microsoft", "https://en.wikipedia.org/wiki/Microsoft"),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory scanned for input units.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Directory output units are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum in-flight requests (completion calls or page fetches).
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_input_dir() -> String {
    "dat/raw_data".into()
}
fn default_output_dir() -> String {
    "dat/result".into()
}
fn default_concurrency() -> u32 {
    4
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Temperature for literal, extraction-style runs (per-unit mode).
    #[serde(default = "default_extract_temperature")]
    pub extract_temperature: f64,

    /// Temperature for generative synonym runs (per-record mode).
    #[serde(default = "default_generate_temperature")]
    pub generate_temperature: f64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            extract_temperature: default_extract_temperature(),
            generate_temperature: default_generate_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_extract_temperature() -> f64 {
    0.1
}
fn default_generate_temperature() -> f64 {
    0.6
}

/// `[prompt]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Plain-text file holding the base system instructions.
    #[serde(default = "default_instructions_path")]
    pub instructions_path: String,

    /// Unit stem → text appended to the base instructions for that unit.
    #[serde(default)]
    pub suffixes: BTreeMap<String, String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            instructions_path: default_instructions_path(),
            suffixes: BTreeMap::new(),
        }
    }
}

fn default_instructions_path() -> String {
    "dat/prompt/system_prompt.txt".into()
}

// ---------------------------------------------------------------------------
// Client config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime completion-client configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer token.
    pub api_key: String,
    /// Base URL, without the trailing `/chat/completions`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Build from the `[openai]` section. Uses the generative temperature;
    /// callers override it for extraction runs.
    pub fn from_app(config: &AppConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: config.openai.base_url.clone(),
            model: config.openai.model.clone(),
            temperature: config.openai.generate_temperature,
            timeout_secs: config.openai.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.brandlex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BrandlexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.brandlex/brandlex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BrandlexError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BrandlexError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BrandlexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BrandlexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BrandlexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(BrandlexError::config(format!(
            "API key not found. Set the {var_name} environment variable \
             (a .env file in the working directory is also read)."
        ))),
    }
}
