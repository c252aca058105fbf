//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use brandlex_core::source::{DEFAULT_CSV_COLUMN, DEFAULT_JSON_FIELD_PATH};
use brandlex_core::{
    ChatCompletionClient, EnrichMode, InputFormat, OutputShape, Pipeline, PipelineConfig,
    PipelineProgress, PromptBuilder, RunSummary, SuffixTable, write_brand_units, write_json,
};
use brandlex_fetcher::Fetcher;
use brandlex_shared::{AppConfig, ClientConfig, init_config, load_config, resolve_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// brandlex: multilingual brand names and LLM-generated synonyms.
#[derive(Parser)]
#[command(
    name = "brandlex",
    version,
    about = "Fetch multilingual brand names and enrich titles with an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch interlanguage titles for the configured brands.
    Fetch {
        /// Output directory (defaults to the configured output dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write every brand into one `<UNIT>.json` instead of one file per brand.
        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Enrich every input file in a directory.
    Enrich(EnrichArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `enrich`.
#[derive(Args, Debug, Clone)]
pub(crate) struct EnrichArgs {
    /// Directory of input units (defaults to the configured input dir).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory outputs are written to (created if missing).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Input file format.
    #[arg(long, value_enum, default_value = "csv")]
    pub format: FormatArg,

    /// One request per record, or one per file.
    #[arg(short, long, value_enum, default_value = "per-record")]
    pub mode: ModeArg,

    /// Output shape (defaults to mapping for per-record, text for per-unit).
    #[arg(long, value_enum)]
    pub shape: Option<ShapeArg>,

    /// CSV column holding the title (0-based).
    #[arg(long)]
    pub column: Option<usize>,

    /// Dotted path to the title inside each JSON entry.
    #[arg(long)]
    pub field_path: Option<String>,

    /// Base instructions file (defaults to the configured path).
    #[arg(long)]
    pub instructions: Option<PathBuf>,

    /// Model identifier override.
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature override.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum concurrent requests per file.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FormatArg {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ModeArg {
    PerRecord,
    PerUnit,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ShapeArg {
    Mapping,
    Metrics,
    Text,
    Report,
}

impl From<ModeArg> for EnrichMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::PerRecord => Self::PerRecord,
            ModeArg::PerUnit => Self::PerUnit,
        }
    }
}

impl From<ShapeArg> for OutputShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Mapping => Self::Mapping,
            ShapeArg::Metrics => Self::Metrics,
            ShapeArg::Text => Self::Text,
            ShapeArg::Report => Self::Report,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "brandlex=info",
        1 => "brandlex=debug",
        _ => "brandlex=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fetch { out, unit } => cmd_fetch(out.as_deref(), unit.as_deref()).await,
        Command::Enrich(args) => cmd_enrich(&args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// fetch
// ---------------------------------------------------------------------------

async fn cmd_fetch(out: Option<&Path>, unit: Option<&str>) -> Result<()> {
    let config = load_config()?;
    if config.brands.is_empty() {
        return Err(eyre!("no brands configured; add a [brands] table to the config file"));
    }

    let out_dir = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    ensure_dir(&out_dir)?;

    info!(brands = config.brands.len(), out = %out_dir.display(), "fetching brand names");

    let spinner = spinner("Fetching brand pages");
    let fetcher = Fetcher::new(config.defaults.concurrency as usize)?;
    let report = fetcher.fetch_brands(&config.brands).await;
    spinner.finish_and_clear();

    let written = match unit {
        Some(unit) => {
            let path = out_dir.join(format!("{unit}.json"));
            write_json(&report.names, &path)?;
            vec![path]
        }
        None => write_brand_units(&report.names, &out_dir)?,
    };

    println!();
    println!("  Brand names fetched");
    println!("  Brands:  {}", report.names.len());
    println!("  Failed:  {}", report.failures.len());
    for (brand, error) in &report.failures {
        println!("    - {brand}: {error}");
    }
    println!("  Files:   {}", written.len());
    println!("  Path:    {}", out_dir.display());
    println!("  Time:    {:.1}s", report.duration.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// enrich
// ---------------------------------------------------------------------------

async fn cmd_enrich(args: &EnrichArgs) -> Result<()> {
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;

    let pipeline_config = pipeline_config(args, &config)?;
    let client_config = client_config(args, &config, api_key);

    let instructions = args
        .instructions
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.prompt.instructions_path));
    let prompts = PromptBuilder::from_file(
        &instructions,
        SuffixTable::from(config.prompt.suffixes.clone()),
    )?;

    let input = args
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.input_dir));
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    ensure_dir(&output)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        mode = ?pipeline_config.mode,
        shape = ?pipeline_config.shape,
        model = %client_config.model,
        temperature = client_config.temperature,
        "starting enrichment"
    );

    let client = Arc::new(ChatCompletionClient::new(&client_config)?);
    let pipeline = Pipeline::new(client, prompts, pipeline_config)?;

    let progress = CliProgress::new();
    let summary = pipeline.run_dir(&input, &output, &progress).await?;
    progress.finish();

    print_summary(&summary, &output);
    Ok(())
}

/// Merge CLI flags with the config file into a pipeline config.
fn pipeline_config(args: &EnrichArgs, config: &AppConfig) -> Result<PipelineConfig> {
    let format = match args.format {
        FormatArg::Csv => InputFormat::Csv {
            column: args.column.unwrap_or(DEFAULT_CSV_COLUMN),
        },
        FormatArg::Json => {
            InputFormat::json_at(args.field_path.as_deref().unwrap_or(DEFAULT_JSON_FIELD_PATH))?
        }
    };

    let mode = EnrichMode::from(args.mode);
    let shape = args
        .shape
        .map(OutputShape::from)
        .unwrap_or_else(|| OutputShape::default_for(mode));
    if shape.mode() != mode {
        return Err(eyre!("--shape {shape:?} is not available with --mode {mode:?}"));
    }

    let concurrency = args
        .concurrency
        .unwrap_or(config.defaults.concurrency as usize);

    Ok(PipelineConfig::new(mode, format)
        .with_shape(shape)
        .with_concurrency(concurrency))
}

/// Merge CLI flags with the `[openai]` section. Per-unit runs default to the
/// extraction temperature.
fn client_config(args: &EnrichArgs, config: &AppConfig, api_key: String) -> ClientConfig {
    let mut client = ClientConfig::from_app(config, api_key);
    if let ModeArg::PerUnit = args.mode {
        client.temperature = config.openai.extract_temperature;
    }
    if let Some(temperature) = args.temperature {
        client.temperature = temperature;
    }
    if let Some(model) = &args.model {
        client.model = model.clone();
    }
    client
}

fn print_summary(summary: &RunSummary, output: &Path) {
    println!();
    println!("  Enrichment finished");
    println!("  Run:      {}", summary.run_id);
    println!("  Written:  {}", summary.units_written);
    println!("  Failed:   {}", summary.units_failed.len());
    for (unit, error) in &summary.units_failed {
        println!("    - {unit}: {error}");
    }
    println!(
        "  Records:  {} enriched, {} failed",
        summary.records_enriched, summary.records_failed
    );
    println!("  Output:   {}", output.display());
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| eyre!("cannot create directory '{}': {e}", path.display()))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message.to_string());
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: spinner("Discovering input files"),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineProgress for CliProgress {
    fn unit_started(&self, stem: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {stem}"));
    }

    fn request_done(&self, stem: &str, completed: usize, total: usize) {
        self.spinner
            .set_message(format!("{stem}: {completed}/{total} requests"));
    }

    fn unit_finished(&self, stem: &str, ok: bool) {
        if !ok {
            self.spinner.println(format!("  ✗ {stem}"));
        }
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> EnrichArgs {
        let mut argv = vec!["brandlex", "enrich"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).expect("valid args").command {
            Command::Enrich(args) => args,
            _ => panic!("expected enrich"),
        }
    }

    #[test]
    fn enrich_defaults_to_per_record_mapping_over_csv() {
        let config = AppConfig::default();
        let pipeline = pipeline_config(&parse(&[]), &config).unwrap();
        assert_eq!(pipeline.mode, EnrichMode::PerRecord);
        assert_eq!(pipeline.shape, OutputShape::Mapping);
        assert_eq!(pipeline.format, InputFormat::csv());
        assert_eq!(pipeline.concurrency, 4);
    }

    #[test]
    fn per_unit_json_uses_field_path_and_text_shape() {
        let config = AppConfig::default();
        let args = parse(&["--format", "json", "--mode", "per-unit", "--field-path", "ja.title"]);
        let pipeline = pipeline_config(&args, &config).unwrap();
        assert_eq!(pipeline.shape, OutputShape::Text);
        assert_eq!(pipeline.format, InputFormat::json_at("ja.title").unwrap());
    }

    #[test]
    fn incompatible_shape_is_rejected() {
        let config = AppConfig::default();
        let args = parse(&["--mode", "per-unit", "--shape", "metrics"]);
        assert!(pipeline_config(&args, &config).is_err());
    }

    #[test]
    fn temperature_follows_mode_unless_overridden() {
        let config = AppConfig::default();

        let record = client_config(&parse(&[]), &config, "k".into());
        assert!((record.temperature - 0.6).abs() < f64::EPSILON);

        let unit = client_config(&parse(&["--mode", "per-unit"]), &config, "k".into());
        assert!((unit.temperature - 0.1).abs() < f64::EPSILON);

        let custom = client_config(
            &parse(&["--temperature", "0.3", "--model", "gpt-4o-mini"]),
            &config,
            "k".into(),
        );
        assert!((custom.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(custom.model, "gpt-4o-mini");
    }

    #[test]
    fn fetch_splits_per_brand_unless_unit_given() {
        let split = Cli::try_parse_from(["brandlex", "fetch"]).unwrap();
        assert!(matches!(split.command, Command::Fetch { unit: None, .. }));

        let combined = Cli::try_parse_from(["brandlex", "fetch", "--unit", "brands"]).unwrap();
        match combined.command {
            Command::Fetch { unit, .. } => assert_eq!(unit.as_deref(), Some("brands")),
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn ensure_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
