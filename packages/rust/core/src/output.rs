//! Output units and the file sink.
//!
//! JSON outputs are UTF-8, pretty-printed with a 4-space indent, and keep
//! non-ASCII characters literal. Mapping outputs have sorted keys. Files are
//! overwritten; the destination directory must already exist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use brandlex_shared::{BrandlexError, LanguageTitles, Result};

/// `display_name` written into metric entries.
pub const DEFAULT_DISPLAY_NAME: &str = "Default Display Name";

/// `metadatas.cit` written into metric entries.
pub const DEFAULT_CIT: &str = "Default CIT";

/// `metadatas.category` written into metric entries.
pub const DEFAULT_CATEGORY: &str = "Performance";

/// Synonym list of one record; `None` when its request failed.
pub type Synonyms = Option<Vec<String>>;

/// One entry of the metric-list output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub metric_id: String,
    pub synonyms: Vec<String>,
    pub display_name: String,
    pub metadatas: MetricMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricMetadata {
    pub cit: String,
    pub category: String,
}

impl MetricEntry {
    /// Entry with the default display name and metadata.
    pub fn new(metric_id: impl Into<String>, synonyms: Vec<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            synonyms,
            display_name: DEFAULT_DISPLAY_NAME.into(),
            metadatas: MetricMetadata {
                cit: DEFAULT_CIT.into(),
                category: DEFAULT_CATEGORY.into(),
            },
        }
    }
}

/// Outcome of a whole-unit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of one unit, in the shape it will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputUnit {
    /// `{identifier: [synonyms] | null}`.
    Mapping(BTreeMap<String, Synonyms>),
    /// `[{metric_id, synonyms, display_name, metadatas}]`, failures omitted.
    Metrics(Vec<MetricEntry>),
    /// Raw completion text. Not writable when the request failed.
    Text(UnitReport),
    /// `{"unit", "content"}` or `{"unit", "error"}`.
    Report(UnitReport),
}

impl OutputUnit {
    /// File name this output is written under, for a unit with `stem`.
    pub fn file_name(&self, stem: &str) -> String {
        match self {
            Self::Mapping(_) | Self::Metrics(_) => format!("{stem}.json"),
            Self::Text(_) => format!("{stem}_processed.txt"),
            Self::Report(_) => format!("{stem}_processed.json"),
        }
    }

    /// Whether there is anything to write.
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Text(report) => report.content.is_some(),
            _ => true,
        }
    }

    /// Serialize to the exact bytes written by [`write_output`].
    pub fn render(&self) -> Result<Vec<u8>> {
        match self {
            Self::Mapping(map) => to_pretty_json(map),
            Self::Metrics(entries) => to_pretty_json(entries),
            Self::Report(report) => to_pretty_json(report),
            Self::Text(report) => report
                .content
                .as_ref()
                .map(|c| c.as_bytes().to_vec())
                .ok_or_else(|| {
                    BrandlexError::validation(format!(
                        "unit '{}' has no completion text to write",
                        report.unit
                    ))
                }),
        }
    }
}

/// Write `output` to `destination`, replacing any existing file.
pub fn write_output(output: &OutputUnit, destination: &Path) -> Result<()> {
    let bytes = output.render()?;
    std::fs::write(destination, &bytes).map_err(|e| BrandlexError::io(destination, e))?;
    info!(path = %destination.display(), bytes = bytes.len(), "output written");
    Ok(())
}

/// Write any serializable value as pretty JSON (used for fetched brand names).
pub fn write_json<T: Serialize + ?Sized>(value: &T, destination: &Path) -> Result<()> {
    let bytes = to_pretty_json(value)?;
    std::fs::write(destination, &bytes).map_err(|e| BrandlexError::io(destination, e))
}

/// Write each brand's titles to `<brand>.json` in `dir`.
///
/// Every file holds a one-entry document `{brand: {lang: {title, url}}}`,
/// so the brand name becomes the unit stem of a later JSON run and selects
/// that brand's prompt suffix. Brand names are checked before anything is
/// written.
pub fn write_brand_units(
    names: &BTreeMap<String, LanguageTitles>,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    if let Some(bad) = names.keys().find(|brand| !is_plain_stem(brand)) {
        return Err(BrandlexError::validation(format!(
            "brand name '{bad}' cannot be used as a file name"
        )));
    }

    let mut written = Vec::with_capacity(names.len());
    for (brand, titles) in names {
        let path = dir.join(format!("{brand}.json"));
        write_json(&BTreeMap::from([(brand, titles)]), &path)?;
        info!(%brand, path = %path.display(), languages = titles.len(), "brand unit written");
        written.push(path);
    }
    Ok(written)
}

fn is_plain_stem(name: &str) -> bool {
    !name.trim().is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| BrandlexError::validation(format!("failed to serialize output: {e}")))?;
    Ok(buf)
}
