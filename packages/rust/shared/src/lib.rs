//! Shared types, error model, and configuration for brandlex.
//!
//! This crate is the foundation depended on by all other brandlex crates.
//! It provides:
//! - [`BrandlexError`] — the unified error type
//! - Domain types ([`Record`], [`EnrichmentRequest`], [`LanguageTitle`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ClientConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClientConfig, DefaultsConfig, OpenAiConfig, PromptConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{BrandlexError, Result};
pub use types::{EnrichmentRequest, LanguageTitle, LanguageTitles, Record, RunId};
