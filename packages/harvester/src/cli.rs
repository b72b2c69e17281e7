//! Command-line interface for the harvester.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{Disposition, HarvesterError};
use crate::harvester::{HarvestFailure, HarvestOptions, Harvester};
use crate::identifier::validate;
use crate::text::wrap_text;
use crate::types::PatentDocument;

/// Width used for the abstract preview.
const PREVIEW_WIDTH: usize = 80;

/// Patent Harvester - Fetch a patent page and print it as a structured record.
#[derive(Parser)]
#[command(name = "patent-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a patent by publication number and print the record.
    Fetch {
        /// Publication number (e.g., US8400417B2)
        id: String,

        /// Also download the PDF
        #[arg(short, long)]
        download: bool,

        /// Directory for the downloaded PDF (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Timeout per network operation in seconds
        #[arg(short, long, default_value_t = HTTP_TIMEOUT_SECS)]
        timeout: u64,

        /// Output format of the record
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

/// Serialization of the printed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Harvest(#[from] HarvestFailure),

    #[error(transparent)]
    Harvester(#[from] HarvesterError),
}

/// Run the CLI.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            id,
            download,
            output,
            timeout,
            format,
        } => {
            let options = HarvestOptions {
                download,
                timeout: Duration::from_secs(timeout),
                output_path: output.unwrap_or_else(|| PathBuf::from(".")),
            };
            fetch_command(&id, options, format).await
        }
    }
}

/// Render a record in the requested format.
pub fn render(document: &PatentDocument, format: OutputFormat) -> Result<String, HarvesterError> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml_ng::to_string(document)?,
        OutputFormat::Json => serde_json::to_string_pretty(document)?,
    })
}

/// Execute the fetch command.
async fn fetch_command(
    raw_id: &str,
    options: HarvestOptions,
    format: OutputFormat,
) -> Result<(), CliError> {
    // Validate input before making HTTP requests
    let id = validate(raw_id)?;

    let download = options.download;
    let mut harvester = Harvester::new(id.to_string(), options)?;

    // Ctrl-C cancels the running harvest
    let cancel = harvester.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    eprintln!("{} {}", style("Fetching").bold(), style(&id).cyan());

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(if download {
        "Fetching page and PDF..."
    } else {
        "Fetching page..."
    });
    pb.enable_steady_tick(Duration::from_millis(100));

    let document = match harvester.run().await {
        Ok(document) => document,
        Err(failure) => {
            pb.finish_and_clear();
            let hint = match failure.disposition() {
                Disposition::RetryLater => "transient failure, try again later",
                Disposition::GiveUp => "permanent failure for this identifier",
                Disposition::Investigate => "page structure not recognized",
            };
            eprintln!("  {}", style(hint).yellow());
            return Err(failure.into());
        }
    };

    pb.finish_and_clear();
    print_summary(&document);
    println!("{}", render(&document, format)?);

    Ok(())
}

/// Short human-readable summary on stderr.
fn print_summary(document: &PatentDocument) {
    if let Some(title) = &document.title {
        eprintln!("  Title: {}", style(title).green());
    }
    if let Some(abstract_text) = &document.abstract_text {
        let preview = wrap_text(abstract_text, PREVIEW_WIDTH);
        for line in preview.lines().take(4) {
            eprintln!("    {}", style(line).dim());
        }
    }
    eprintln!("  Claims: {}", document.claims.len());
    eprintln!("  Citations: {}", document.citations.len());
    eprintln!("  Legal events: {}", document.legal_events.len());
    if let Some(path) = &document.pdf_path {
        eprintln!("  {} {}", style("PDF saved to:").green().bold(), path);
    }
    if !document.warnings.is_empty() {
        eprintln!("  Warnings: {}", style(document.warnings.len()).yellow().bold());
    }
}
