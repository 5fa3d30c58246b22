use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use jiff::Zoned;

use kubereport::{
    config::{OutputFormat, ReportConfig, ReportProfile},
    log::setup_logger,
    orchestrator::{open_source, Orchestrator},
};

/// Kubernetes cluster inventory report
#[derive(Parser, Debug)]
#[command(name = "kubereport", version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    context: Option<String>,

    /// Report profile
    #[arg(long, value_enum)]
    report: Option<ReportProfile>,

    /// Output format, defaults to pdf for general and csv for detailed
    #[arg(long, short, value_enum)]
    format: Option<OutputFormat>,

    /// Directory the report is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Read objects from a kubectl List dump instead of a live cluster
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write logs to <dir>/kubereport.log instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<(ReportConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ReportConfig::default(),
        };
        if let Some(kubeconfig) = self.kubeconfig {
            config.kubeconfig = Some(kubeconfig);
        }
        if let Some(context) = self.context {
            config.context = Some(context);
        }
        if let Some(report) = self.report {
            config.report = report;
        }
        if let Some(format) = self.format {
            config.format = Some(format);
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = Some(dir);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        Ok((config, self.snapshot))
    }
}

fn main() -> Result<()> {
    let (config, snapshot) = Cli::parse().into_config()?;

    if let Some(dir) = &config.log_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let (dispatch, _guard) =
        setup_logger(config.log_dir.as_deref()).context("failed to set up logging")?;

    let source = tracing::dispatcher::with_default(&dispatch, || {
        open_source(&config, snapshot.as_deref())
    })
    .context("failed to open data source")?;

    let report = Orchestrator::new(source.as_ref(), dispatch)
        .generate(&config, &Zoned::now())
        .context("report generation failed")?;

    println!("Report for cluster {} written to {}", report.cluster, report.path.display());
    Ok(())
}
