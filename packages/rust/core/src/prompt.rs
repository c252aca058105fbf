//! Prompt construction.
//!
//! The system instructions are a base template plus an optional suffix looked
//! up by unit stem. The user content names the unit and carries either one
//! title or a comma-joined list of titles:
//!
//! ```text
//! (Cisco) title:
//! Catalyst 9300
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use brandlex_shared::{BrandlexError, EnrichmentRequest, Result};

/// Label used when a request carries one title.
const SINGLE_LABEL: &str = "title";

/// Label used when a request carries every title of a unit.
const BATCH_LABEL: &str = "titles";

/// Unit stem → text appended to the base instructions.
///
/// Stems without an entry get the empty suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuffixTable(BTreeMap<String, String>);

impl SuffixTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stem: impl Into<String>, suffix: impl Into<String>) {
        self.0.insert(stem.into(), suffix.into());
    }

    /// Suffix for `stem`, or `""`.
    pub fn get(&self, stem: &str) -> &str {
        self.0.get(stem).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for SuffixTable {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Builds [`EnrichmentRequest`]s for a run.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    base_instructions: String,
    suffixes: SuffixTable,
}

impl PromptBuilder {
    pub fn new(base_instructions: impl Into<String>, suffixes: SuffixTable) -> Self {
        Self {
            base_instructions: base_instructions.into(),
            suffixes,
        }
    }

    /// Load the base instructions from a plain-text file.
    ///
    /// Surrounding whitespace is trimmed so a trailing newline in the file
    /// does not separate the template from its suffix.
    pub fn from_file(path: &Path, suffixes: SuffixTable) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BrandlexError::io(path, e))?;
        if text.trim().is_empty() {
            return Err(BrandlexError::config(format!(
                "instructions file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(text.trim(), suffixes))
    }

    /// Base instructions plus the suffix registered for `stem`.
    pub fn instructions(&self, stem: &str) -> String {
        format!("{}{}", self.base_instructions, self.suffixes.get(stem))
    }

    /// Request covering a single title.
    pub fn single(&self, stem: &str, raw_text: &str) -> EnrichmentRequest {
        self.build(stem, SINGLE_LABEL, raw_text)
    }

    /// Request covering every title of a unit, joined with `", "`.
    pub fn batch<S: AsRef<str>>(&self, stem: &str, titles: &[S]) -> EnrichmentRequest {
        let joined = titles
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ");
        self.build(stem, BATCH_LABEL, &joined)
    }

    fn build(&self, stem: &str, label: &str, body: &str) -> EnrichmentRequest {
        EnrichmentRequest {
            system_instructions: self.instructions(stem),
            user_content: format!("({stem}) {label}:\n{body}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        let mut suffixes = SuffixTable::new();
        suffixes.insert("Cisco", " Do not include '苹果'.");
        PromptBuilder::new("List synonyms.", suffixes)
    }

    #[test]
    fn instructions_append_matching_suffix() {
        let req = builder().single("Cisco", "Catalyst");
        assert_eq!(req.system_instructions, "List synonyms. Do not include '苹果'.");
    }

    #[test]
    fn instructions_without_suffix_are_base_only() {
        let req = builder().single("Huawei", "MateBook");
        assert_eq!(req.system_instructions, "List synonyms.");
    }

    #[test]
    fn single_user_content_format() {
        let req = builder().single("Huawei", "MateBook");
        assert_eq!(req.user_content, "(Huawei) title:\nMateBook");
    }

    #[test]
    fn batch_joins_titles() {
        let req = builder().batch("brands", &["华为", "思科", "微软"]);
        assert_eq!(req.user_content, "(brands) titles:\n华为, 思科, 微软");
    }

    #[test]
    fn build_is_deterministic() {
        let b = builder();
        assert_eq!(b.batch("x", &["a", "b"]), b.batch("x", &["a", "b"]));
    }

    #[test]
    fn from_file_trims_and_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.txt");

        std::fs::write(&path, "Give synonyms.\n").unwrap();
        let b = PromptBuilder::from_file(&path, SuffixTable::new()).unwrap();
        assert_eq!(b.instructions("any"), "Give synonyms.");

        std::fs::write(&path, "  \n").unwrap();
        assert!(PromptBuilder::from_file(&path, SuffixTable::new()).is_err());
    }

    #[test]
    fn suffix_table_from_config_map() {
        let map = BTreeMap::from([("HP".to_string(), "!".to_string())]);
        let table = SuffixTable::from(map);
        assert_eq!(table.get("HP"), "!");
        assert_eq!(table.get("hp"), "");
        assert_eq!(table.len(), 1);
    }
}
