//! PDF Watermark CLI tool
//!
//! Stamps a text watermark onto every page of the given PDF files, or of
//! every PDF in the current directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use anyhow::Context;
use clap::Parser;
use tracing::{error, warn, Level};

use pdf_watermark::apply::OutputTarget;
use pdf_watermark::batch::{run, WatermarkRequest};
use pdf_watermark::pdf::{LopdfLoader, Watermark};
use pdf_watermark::Error;

/// PDF Watermark - Add a text watermark to PDF files
#[derive(Parser)]
#[command(name = "pdf-watermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Watermark every PDF in the current directory
    pdf-watermark CONFIDENTIAL

    # Watermark two files, skipping one of them
    pdf-watermark CONFIDENTIAL -f a.pdf b.pdf -x b.pdf

    # Keep the originals and write report_watermarked.pdf etc.
    pdf-watermark DRAFT -s _watermarked")]
struct Cli {
    /// Text for the watermark (shorter than 28 characters)
    watermark_text: String,

    /// Paths to the input PDF files (default: every PDF in the current directory)
    #[arg(short = 'f', long = "input_files", value_name = "file_name", num_args = 0..)]
    input_files: Vec<PathBuf>,

    /// File names to exclude
    #[arg(short = 'x', long = "exclude", value_name = "file_name", num_args = 0..)]
    exclude: Vec<String>,

    /// Write <name><SUFFIX>.pdf next to each input instead of overwriting it
    #[arg(short, long, value_name = "SUFFIX")]
    suffix: Option<String>,

    /// Log every step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = std::env::current_dir()
        .context("Cannot determine the current directory")
        .and_then(|cwd| watermark_files(cli, &cwd));

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Watermark the files `cli` selects in `cwd`
///
/// Nothing to do is success; any file that could not be watermarked makes the
/// run a failure. Invalid text is an error before any file is touched.
fn watermark_files(cli: Cli, cwd: &Path) -> anyhow::Result<ExitCode> {
    let watermark = Watermark::new(cli.watermark_text)?;

    let request = WatermarkRequest {
        watermark,
        input_files: cli.input_files,
        exclude: cli.exclude,
        output: cli.suffix.map_or(OutputTarget::InPlace, OutputTarget::Suffixed),
    };

    let report = match run(&LopdfLoader, &request, cwd) {
        Ok(report) => report,
        Err(Error::EmptySelection) => {
            warn!("No PDF files to watermark, nothing to do");
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };

    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }

    error!(
        "{} of {} files could not be watermarked",
        report.failures.len(),
        report.failures.len() + report.written.len()
    );
    Ok(ExitCode::FAILURE)
}
