//! Policy Report CLI
//!
//! The `policy-report` command aggregates the policies of every project in an
//! organization and writes one report row per project.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use policy_report_core::{
    emit_run_failed, init_tracing, run_span, JsonReportSink, MarkdownReportSink, Pipeline,
    PolicyReportError, ReportSink, XlsxReportSink,
};
use tracing::{info, Instrument, Level};

mod config;

use config::{ConfigLayer, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "policy-report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Organization-wide policy report", long_about = None)]
struct Cli {
    /// The config file (TOML)
    #[arg(short = 'c', long = "configFile")]
    config_file: Option<PathBuf>,

    /// The organization url
    #[arg(short = 'u', long = "wsUrl")]
    ws_url: Option<String>,

    /// The admin user key
    #[arg(short = 'k', long = "userKey")]
    user_key: Option<String>,

    /// The organization token
    #[arg(short = 't', long = "orgToken")]
    org_token: Option<String>,

    /// The number of concurrent requests to run with (1-20, default 9)
    #[arg(short = 'm', long = "projectParallelismLevel")]
    project_parallelism_level: Option<i64>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Xlsx)]
    format: ReportFormat,

    /// Directory the report is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Xlsx,
    Markdown,
    Json,
}

impl Cli {
    fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            ws_url: self.ws_url.clone(),
            user_key: self.user_key.clone(),
            org_token: self.org_token.clone(),
            project_parallelism_level: self.project_parallelism_level,
        }
    }

    fn sink(&self) -> Box<dyn ReportSink> {
        match self.format {
            ReportFormat::Xlsx => Box::new(XlsxReportSink::new(&self.output_dir)),
            ReportFormat::Markdown => Box::new(MarkdownReportSink::new(&self.output_dir)),
            ReportFormat::Json => Box::new(JsonReportSink::new(&self.output_dir)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json_logs, level);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let category = err
                .downcast_ref::<PolicyReportError>()
                .map(PolicyReportError::category)
                .unwrap_or("fatal error");
            emit_run_failed(category, &format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    info!("Start analyzing arguments.");
    let settings = config::resolve(
        cli.config_layer(),
        cli.config_file.as_deref(),
        Path::new(DEFAULT_CONFIG_FILE),
        |key| std::env::var(key).ok(),
    )
    .context("Invalid configuration")?;
    info!("Finished analyzing arguments.");

    let pipeline = Pipeline::from_settings(&settings).context("Failed to create remote client")?;
    let report = pipeline
        .run()
        .instrument(run_span(&settings.ws_url))
        .await
        .context("Policy aggregation failed")?;

    cli.sink()
        .write(&report.org_name, &report.records)
        .context("Failed to write policy report")?;

    Ok(())
}
