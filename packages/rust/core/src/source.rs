//! Record sources: turn one input file (a unit) into a lazy sequence of records.
//!
//! Two formats are supported:
//! - CSV with a header row; one column holds the title.
//! - JSON documents mapping an identifier to an object, with the title at a
//!   fixed nested path (e.g. `zh.title`).
//!
//! Rows whose title is missing or blank are dropped silently. A unit that
//! cannot be opened or decoded is a [`BrandlexError::Parse`].

use std::fs;
use std::path::{Path, PathBuf};

use brandlex_shared::{BrandlexError, Record, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Column holding the title in CSV inputs (0-based).
pub const DEFAULT_CSV_COLUMN: usize = 1;

/// Path to the title inside each JSON entry.
pub const DEFAULT_JSON_FIELD_PATH: &str = "zh.title";

/// Lazy record sequence. Decode errors surface as `Err` items.
pub type Records = Box<dyn Iterator<Item = Result<Record>> + Send>;

// ---------------------------------------------------------------------------
// Input format
// ---------------------------------------------------------------------------

/// How records are laid out inside a unit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFormat {
    /// Comma-separated rows, header skipped, title at `column`.
    Csv { column: usize },
    /// Top-level object; title at `field_path` inside each value.
    Json { field_path: Vec<String> },
}

impl InputFormat {
    /// CSV with the title in the second column.
    pub fn csv() -> Self {
        Self::Csv {
            column: DEFAULT_CSV_COLUMN,
        }
    }

    /// JSON with the title at `zh.title`.
    pub fn json() -> Self {
        Self::Json {
            field_path: split_field_path(DEFAULT_JSON_FIELD_PATH),
        }
    }

    /// JSON with the title at a dotted path such as `en.title`.
    pub fn json_at(dotted: &str) -> Result<Self> {
        let field_path = split_field_path(dotted);
        if field_path.is_empty() || field_path.iter().any(String::is_empty) {
            return Err(BrandlexError::validation(format!(
                "invalid field path '{dotted}'"
            )));
        }
        Ok(Self::Json { field_path })
    }

    /// File extension (without the dot) of units in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv { .. } => "csv",
            Self::Json { .. } => "json",
        }
    }

    /// Open `path` and return its eligible records.
    pub fn read(&self, path: &Path) -> Result<Records> {
        match self {
            Self::Csv { column } => read_csv(path, *column),
            Self::Json { field_path } => read_json(path, field_path),
        }
    }
}

fn split_field_path(dotted: &str) -> Vec<String> {
    dotted.split('.').map(|s| s.trim().to_string()).collect()
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// One input file, processed together and written to one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// File name without extension; used in prompts and output names.
    pub stem: String,
    pub path: PathBuf,
}

impl Unit {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BrandlexError::validation(format!("no usable file stem in {}", path.display()))
            })?
            .to_string();
        Ok(Self { stem, path })
    }
}

/// Result of scanning an input directory.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Units in path order.
    pub units: Vec<Unit>,
    /// (file name, reason) for matching files that cannot be a unit.
    pub rejected: Vec<(String, String)>,
}

/// List every unit in `dir` matching the format's extension, sorted by path.
///
/// A file whose stem is unusable (empty or not UTF-8) is listed in
/// [`Discovered::rejected`] instead of failing the scan.
pub fn discover_units(dir: &Path, format: &InputFormat) -> Result<Discovered> {
    let entries = fs::read_dir(dir).map_err(|e| BrandlexError::io(dir, e))?;
    let ext = format.extension();

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BrandlexError::io(dir, e))?.path();
        let matches = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();

    let mut discovered = Discovered::default();
    for path in paths {
        match Unit::from_path(&path) {
            Ok(unit) => discovered.units.push(unit),
            Err(e) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                warn!(file = %name, error = %e, "skipping input file");
                discovered.rejected.push((name, e.to_string()));
            }
        }
    }

    debug!(
        dir = %dir.display(),
        units = discovered.units.len(),
        rejected = discovered.rejected.len(),
        "discovered units"
    );
    Ok(discovered)
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn read_csv(path: &Path, column: usize) -> Result<Records> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BrandlexError::parse(format!("{}: {e}", path.display())))?;

    let display = path.display().to_string();
    let records = reader.into_records().filter_map(move |row| match row {
        Ok(row) => {
            let text = row.get(column)?;
            Record::new(text.trim(), text).map(Ok)
        }
        Err(e) => Some(Err(BrandlexError::parse(format!("{display}: {e}")))),
    });

    Ok(Box::new(records))
}

fn read_json(path: &Path, field_path: &[String]) -> Result<Records> {
    let content = fs::read_to_string(path)
        .map_err(|e| BrandlexError::parse(format!("{}: {e}", path.display())))?;

    let document: serde_json::Map<String, Value> = serde_json::from_str(&content)
        .map_err(|e| BrandlexError::parse(format!("{}: {e}", path.display())))?;

    let field_path = field_path.to_vec();
    let records = document.into_iter().filter_map(move |(key, value)| {
        let text = lookup(&value, &field_path)?.as_str()?;
        Record::new(key, text).map(Ok)
    });

    Ok(Box::new(records))
}

fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}
