//! Batch enrichment pipeline: units → records → prompts → completions → output.
//!
//! The pipeline runs in one of two modes:
//! - [`EnrichMode::PerRecord`]: one request per record, dispatched
//!   concurrently (bounded by a semaphore). A failed request yields a null
//!   entry for that record only.
//! - [`EnrichMode::PerUnit`]: every title of the unit joined into one request.
//!
//! Client failures never escape a unit, and unit failures (unreadable input,
//! unwritable output) never abort a directory run.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use brandlex_shared::{BrandlexError, Record, Result, RunId};

use crate::client::EnrichmentClient;
use crate::output::{MetricEntry, OutputUnit, UnitReport, write_output};
use crate::prompt::PromptBuilder;
use crate::source::{InputFormat, Unit, discover_units};

/// Default bound on in-flight requests per unit.
pub const DEFAULT_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// Modes and shapes
// ---------------------------------------------------------------------------

/// How records are grouped into requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMode {
    PerRecord,
    PerUnit,
}

/// How a unit's results are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// `{identifier: [synonyms] | null}` (per-record).
    Mapping,
    /// List of metric entries (per-record).
    Metrics,
    /// Raw completion text (per-unit).
    Text,
    /// `{"unit", "content" | "error"}` JSON (per-unit).
    Report,
}

impl OutputShape {
    /// The mode this shape is produced by.
    pub fn mode(self) -> EnrichMode {
        match self {
            Self::Mapping | Self::Metrics => EnrichMode::PerRecord,
            Self::Text | Self::Report => EnrichMode::PerUnit,
        }
    }

    /// Shape used when none is requested.
    pub fn default_for(mode: EnrichMode) -> Self {
        match mode {
            EnrichMode::PerRecord => Self::Mapping,
            EnrichMode::PerUnit => Self::Text,
        }
    }
}

// ---------------------------------------------------------------------------
// Config and results
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: EnrichMode,
    pub shape: OutputShape,
    pub format: InputFormat,
    /// Maximum concurrent requests within a unit (per-record mode).
    pub concurrency: usize,
}

impl PipelineConfig {
    /// Config with the mode's default shape and default concurrency.
    pub fn new(mode: EnrichMode, format: InputFormat) -> Self {
        Self {
            mode,
            shape: OutputShape::default_for(mode),
            format,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_shape(mut self, shape: OutputShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.shape.mode() != self.mode {
            return Err(BrandlexError::validation(format!(
                "output shape {:?} cannot be produced in {:?} mode",
                self.shape, self.mode
            )));
        }
        if self.concurrency == 0 {
            return Err(BrandlexError::validation("concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Result of enriching one unit.
#[derive(Debug, Clone)]
pub struct UnitRun {
    pub stem: String,
    pub output: OutputUnit,
    /// Requests that succeeded.
    pub enriched: usize,
    /// Requests that failed and were recorded as null/absent.
    pub failed: usize,
}

/// Summary of a directory run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub units_written: usize,
    /// (unit stem, error description) for every unit without an output file.
    pub units_failed: Vec<(String, String)>,
    pub records_enriched: usize,
    pub records_failed: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for pipeline runs.
pub trait PipelineProgress: Send + Sync {
    /// Called before a unit is read.
    fn unit_started(&self, stem: &str, current: usize, total: usize);
    /// Called as each request of the unit resolves.
    fn request_done(&self, stem: &str, completed: usize, total: usize);
    /// Called after a unit is written or abandoned.
    fn unit_finished(&self, stem: &str, ok: bool);
}

/// No-op pipeline progress.
pub struct SilentProgress;

impl PipelineProgress for SilentProgress {
    fn unit_started(&self, _stem: &str, _current: usize, _total: usize) {}
    fn request_done(&self, _stem: &str, _completed: usize, _total: usize) {}
    fn unit_finished(&self, _stem: &str, _ok: bool) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Enrichment pipeline with an injected client.
pub struct Pipeline {
    client: Arc<dyn EnrichmentClient>,
    prompts: PromptBuilder,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn EnrichmentClient>,
        prompts: PromptBuilder,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            prompts,
            config,
        })
    }

    /// Enrich every unit in `input_dir` and write one output per unit into
    /// `output_dir`.
    ///
    /// Only an unreadable `input_dir` is an error; per-unit failures are
    /// logged and listed in the summary.
    #[instrument(skip_all, fields(run_id, input = %input_dir.display(), mode = ?self.config.mode))]
    pub async fn run_dir(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        progress: &dyn PipelineProgress,
    ) -> Result<RunSummary> {
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));
        let started_at = Utc::now();
        let start = Instant::now();

        let discovered = discover_units(input_dir, &self.config.format)?;
        let units = discovered.units;
        info!(
            units = units.len(),
            rejected = discovered.rejected.len(),
            "starting enrichment run"
        );

        let mut summary = RunSummary {
            run_id,
            started_at,
            units_written: 0,
            units_failed: discovered.rejected,
            records_enriched: 0,
            records_failed: 0,
            elapsed: Duration::ZERO,
        };

        let total = units.len();
        for (i, unit) in units.iter().enumerate() {
            progress.unit_started(&unit.stem, i + 1, total);
            let outcome = self.process_unit(unit, output_dir, progress, &mut summary).await;
            if let Err(e) = &outcome {
                error!(unit = %unit.stem, error = %e, "unit failed");
                summary.units_failed.push((unit.stem.clone(), e.to_string()));
            }
            progress.unit_finished(&unit.stem, outcome.is_ok());
        }

        summary.elapsed = start.elapsed();
        info!(
            units_written = summary.units_written,
            units_failed = summary.units_failed.len(),
            records_enriched = summary.records_enriched,
            records_failed = summary.records_failed,
            elapsed_ms = summary.elapsed.as_millis(),
            "enrichment run complete"
        );

        Ok(summary)
    }

    async fn process_unit(
        &self,
        unit: &Unit,
        output_dir: &Path,
        progress: &dyn PipelineProgress,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let run = self.enrich_unit(unit, progress).await?;
        summary.records_enriched += run.enriched;
        summary.records_failed += run.failed;

        if !run.output.is_writable() {
            return Err(BrandlexError::Enrichment(format!(
                "no completion text for unit '{}', nothing written",
                run.stem
            )));
        }

        let destination = output_dir.join(run.output.file_name(&run.stem));
        write_output(&run.output, &destination)?;
        summary.units_written += 1;
        Ok(())
    }

    /// Enrich a single unit without writing it.
    pub async fn run_unit(&self, unit: &Unit) -> Result<UnitRun> {
        self.enrich_unit(unit, &SilentProgress).await
    }

    #[instrument(skip_all, fields(unit = %unit.stem))]
    async fn enrich_unit(&self, unit: &Unit, progress: &dyn PipelineProgress) -> Result<UnitRun> {
        let records = self
            .config
            .format
            .read(&unit.path)?
            .collect::<Result<Vec<_>>>()?;

        debug!(records = records.len(), "unit read");

        let run = match self.config.mode {
            EnrichMode::PerRecord => self.per_record(&unit.stem, records, progress).await,
            EnrichMode::PerUnit => self.per_unit(&unit.stem, records, progress).await,
        };

        info!(enriched = run.enriched, failed = run.failed, "unit enriched");
        Ok(run)
    }

    async fn per_record(
        &self,
        stem: &str,
        records: Vec<Record>,
        progress: &dyn PipelineProgress,
    ) -> UnitRun {
        let mut seen = HashSet::new();
        let records: Vec<Record> = records
            .into_iter()
            .filter(|r| {
                let fresh = seen.insert(r.source_identifier.clone());
                if !fresh {
                    debug!(record = %r.source_identifier, "duplicate identifier, skipping");
                }
                fresh
            })
            .collect();

        let total = records.len();
        let completed = AtomicUsize::new(0);
        let semaphore = Semaphore::new(self.config.concurrency);
        let (semaphore, completed) = (&semaphore, &completed);

        let tasks = records.iter().map(|record| async move {
            // The semaphore is never closed, so acquisition only waits.
            let _permit = semaphore.acquire().await;
            let request = self.prompts.single(stem, &record.raw_text);
            let result = self.client.complete(&request).await;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            progress.request_done(stem, done, total);
            (record, result)
        });
        let results = join_all(tasks).await;

        let mut enriched = 0;
        let mut failed = 0;
        let mut mapping = BTreeMap::new();
        let mut metrics = Vec::new();

        for (record, result) in results {
            let synonyms = match result {
                Ok(content) => {
                    enriched += 1;
                    Some(split_lines(&content))
                }
                Err(e) => {
                    failed += 1;
                    warn!(record = %record.source_identifier, error = %e, "enrichment failed");
                    None
                }
            };
            match self.config.shape {
                OutputShape::Metrics => {
                    if let Some(synonyms) = synonyms {
                        metrics.push(MetricEntry::new(stem, synonyms));
                    }
                }
                _ => {
                    mapping.insert(record.source_identifier.clone(), synonyms);
                }
            }
        }

        let output = match self.config.shape {
            OutputShape::Metrics => OutputUnit::Metrics(metrics),
            _ => OutputUnit::Mapping(mapping),
        };

        UnitRun {
            stem: stem.to_string(),
            output,
            enriched,
            failed,
        }
    }

    async fn per_unit(
        &self,
        stem: &str,
        records: Vec<Record>,
        progress: &dyn PipelineProgress,
    ) -> UnitRun {
        let mut report = UnitReport {
            unit: stem.to_string(),
            content: None,
            error: None,
        };
        let (mut enriched, mut failed) = (0, 0);

        if records.is_empty() {
            warn!("no eligible records, no request sent");
            report.error = Some("no eligible records".into());
        } else {
            let titles: Vec<&str> = records.iter().map(|r| r.raw_text.as_str()).collect();
            let request = self.prompts.batch(stem, &titles);
            debug!(titles = titles.len(), "sending unit request");

            match self.client.complete(&request).await {
                Ok(content) => {
                    enriched = 1;
                    report.content = Some(content);
                }
                Err(e) => {
                    failed = 1;
                    warn!(error = %e, "unit enrichment failed");
                    report.error = Some(e.to_string());
                }
            }
            progress.request_done(stem, 1, 1);
        }

        let output = match self.config.shape {
            OutputShape::Report => OutputUnit::Report(report),
            _ => OutputUnit::Text(report),
        };

        UnitRun {
            stem: stem.to_string(),
            output,
            enriched,
            failed,
        }
    }
}

/// Split a completion into trimmed, non-empty lines.
fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
