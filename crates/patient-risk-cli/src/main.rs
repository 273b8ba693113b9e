use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use patient_risk_core::{
    assess, render_report, ApiSettings, OutputFormat, Paginator, PatientRecord, PipelineOutcome,
    ReqwestTransport, RiskPipeline,
};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "patient-risk",
    author,
    version,
    about = "Fetch patient records and flag high-risk, fever and data-quality cases"
)]
struct Cli {
    /// Optional settings file (TOML, YAML or JSON); PATIENT_RISK_* variables take precedence
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Human, global = true)]
    format: Format,

    /// Include per-record score breakdowns
    #[arg(long, global = true)]
    details: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch every page from the patient API and assess each record
    Assess {
        /// Records per page (overrides page_limit from settings)
        #[arg(long, value_name = "N")]
        limit: Option<u32>,
        /// Per-request timeout, e.g. `10s` or `750ms`
        #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
    /// Assess records from a local JSON file instead of the API
    Score {
        /// JSON array of records, or a page body with a `data` field
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Human,
    Json,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Page { data: Vec<PatientRecord> },
    Records(Vec<PatientRecord>),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let outcome = match cli.command.unwrap_or(Commands::Assess {
        limit: None,
        timeout: None,
    }) {
        Commands::Assess { limit, timeout } => {
            run_assess(cli.config.as_deref(), limit, timeout).await?
        }
        Commands::Score { file } => score_file(&file)?,
    };
    print!("{}", render_report(&outcome, cli.format.into(), cli.details)?);
    Ok(())
}

async fn run_assess(
    config: Option<&Path>,
    limit: Option<u32>,
    timeout: Option<Duration>,
) -> Result<PipelineOutcome> {
    let mut settings = load_settings(config)?;
    if let Some(timeout) = timeout {
        settings.timeout = timeout;
    }
    let limit = limit.unwrap_or(settings.page_limit);
    info!(base_url = %settings.base_url, limit, "assessing patients");

    let transport = ReqwestTransport::new(settings.api_key.clone())?;
    let pipeline = RiskPipeline::new(Paginator::new(transport, settings));
    Ok(pipeline.run(Some(limit)).await)
}

fn score_file(path: &Path) -> Result<PipelineOutcome> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read records from {}", path.display()))?;
    let records = match serde_json::from_str::<RecordsFile>(&raw)
        .with_context(|| format!("{} is not a JSON record list or page", path.display()))?
    {
        RecordsFile::Page { data } => data,
        RecordsFile::Records(records) => records,
    };
    let (result, scored) = assess(records);
    Ok(PipelineOutcome {
        result,
        scored,
        complete: true,
        ..PipelineOutcome::default()
    })
}

/// Layer the optional settings file under `PATIENT_RISK_*` environment variables.
fn load_settings(path: Option<&Path>) -> Result<ApiSettings> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let merged = builder
        .add_source(config::Environment::with_prefix("PATIENT_RISK"))
        .build()
        .context("failed to load settings")?;
    let vars: HashMap<String, String> = merged
        .try_deserialize()
        .context("settings must be flat key/value pairs")?;
    ApiSettings::from_map(vars)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
