//! Core domain types for brandlex.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one enrichment or fetch run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One enrichable item read from an input unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Key the enrichment result is stored under (a title or a document key).
    pub source_identifier: String,
    /// Text sent to the completion service. Never blank.
    pub raw_text: String,
}

impl Record {
    /// Build a record, returning `None` when `raw_text` is blank.
    pub fn new(source_identifier: impl Into<String>, raw_text: &str) -> Option<Self> {
        let text = raw_text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            source_identifier: source_identifier.into(),
            raw_text: text.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// EnrichmentRequest
// ---------------------------------------------------------------------------

/// A single completion request: system role text plus user role text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentRequest {
    pub system_instructions: String,
    pub user_content: String,
}

// ---------------------------------------------------------------------------
// Interlanguage names
// ---------------------------------------------------------------------------

/// An article title in one language, as found in an interlanguage link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTitle {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Language code → title, for one brand.
pub type LanguageTitles = BTreeMap<String, LanguageTitle>;
