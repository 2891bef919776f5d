//! Extract command - extract plain text from a single file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use grabber_core::FileContentExtractor;

use super::{PdfOptionArgs, resolve_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// File path or URL
    #[arg(required = true)]
    location: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Treat the file as this content type instead of the declared one
    #[arg(long)]
    content_type: Option<String>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(flatten)]
    pdf: PdfOptionArgs,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = resolve_config(config_path, &args.pdf)?;
    let extractor = FileContentExtractor::new(&config)?;

    info!("Extracting text from {}", args.location);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Extracting {}...", args.location));
    pb.enable_steady_tick(Duration::from_millis(100));

    let extraction = async {
        match &args.content_type {
            Some(content_type) => extractor.extract_as(&args.location, content_type).await,
            None => extractor.extract(&args.location).await,
        }
    };

    let result = match args.timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), extraction).await {
            Ok(result) => result,
            Err(_) => {
                pb.finish_and_clear();
                anyhow::bail!("Extraction timed out after {}s", secs);
            }
        },
        None => extraction.await,
    };
    pb.finish_and_clear();

    let text = result?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &text)?;
        println!(
            "{} Output written to {} ({} chars)",
            style("✓").green(),
            output_path.display(),
            text.chars().count()
        );
    } else {
        println!("{}", text);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
