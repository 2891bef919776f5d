//! Batch command - extract text from many files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use grabber_core::FileContentExtractor;

use super::{PdfOptionArgs, resolve_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files, URLs or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write `<name>.txt` for each file into this directory (default: stdout)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of files processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    #[command(flatten)]
    pdf: PdfOptionArgs,
}

/// Result of processing a single file.
struct ExtractResult {
    location: String,
    text: Option<String>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = resolve_config(config_path, &args.pdf)?;
    let extractor = FileContentExtractor::new(&config)?;

    let locations = expand_inputs(&args.inputs)?;
    if locations.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.inputs.join(" "));
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        locations.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(locations.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut pending = stream::iter(locations)
        .map(|location| {
            let extractor = &extractor;
            async move {
                let file_start = Instant::now();
                let result = extractor.extract(&location).await;
                (location, result, file_start.elapsed().as_millis() as u64)
            }
        })
        .buffer_unordered(args.jobs.max(1));

    let mut results = Vec::new();
    while let Some((location, result, processing_time_ms)) = pending.next().await {
        overall_pb.inc(1);
        match result {
            Ok(text) => {
                results.push(ExtractResult {
                    location,
                    text: Some(text),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", location, error_msg);
                    results.push(ExtractResult {
                        location,
                        text: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    overall_pb.abandon();
                    error!("Failed to process {}: {}", location, error_msg);
                    anyhow::bail!("Processing failed for {}: {}", location, error_msg);
                }
            }
        }
    }

    overall_pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.text.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    let mut used_names = HashSet::new();
    for result in &successful {
        let Some(text) = &result.text else { continue };
        match &args.output_dir {
            Some(output_dir) => {
                let name = unique_name(output_stem(&result.location), &mut used_names);
                let output_path = output_dir.join(format!("{}.txt", name));
                fs::write(&output_path, text)?;
                debug!("Wrote output to {}", output_path.display());
            }
            None => {
                println!("==> {} <==", result.location);
                println!("{}", text);
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.location,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn is_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file://")
}

/// Expand glob patterns; URLs and plain paths are kept as given.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<String>> {
    let mut locations = Vec::new();
    for input in inputs {
        if is_url(input) || !input.contains(['*', '?', '[']) {
            locations.push(input.clone());
            continue;
        }

        let before = locations.len();
        for path in glob(input)?.filter_map(|r| r.ok()) {
            if path.is_file() {
                locations.push(path.to_string_lossy().into_owned());
            }
        }
        if locations.len() == before {
            warn!("Pattern matched no files: {}", input);
        }
    }
    Ok(locations)
}

/// File name for a location's output, without extension.
fn output_stem(location: &str) -> String {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    Path::new(path.trim_end_matches('/'))
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("output")
        .to_string()
}

/// Suffix `stem` with `-2`, `-3`, ... until it is not in `used`.
fn unique_name(stem: String, used: &mut HashSet<String>) -> String {
    let mut name = stem.clone();
    let mut n = 2;
    while used.contains(&name) {
        name = format!("{}-{}", stem, n);
        n += 1;
    }
    used.insert(name.clone());
    name
}

fn write_summary(path: &Path, results: &[ExtractResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["location", "status", "chars", "processing_time_ms", "error"])?;

    for result in results {
        match &result.text {
            Some(text) => wtr.write_record([
                result.location.as_str(),
                "success",
                &text.chars().count().to_string(),
                &result.processing_time_ms.to_string(),
                "",
            ])?,
            None => wtr.write_record([
                result.location.as_str(),
                "error",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem("/tmp/report.pdf"), "report");
        assert_eq!(output_stem("https://example.com/files/data.csv?sig=abc"), "data");
        assert_eq!(output_stem("https://example.com/"), "example");
        assert_eq!(output_stem(""), "output");
    }

    #[test]
    fn test_unique_name_suffixes_duplicates() {
        let mut used = HashSet::new();
        let names: Vec<_> = ["a/report.pdf", "b/report.pdf", "c/report.docx", "report-2.txt"]
            .iter()
            .map(|location| unique_name(output_stem(location), &mut used))
            .collect();
        assert_eq!(names, vec!["report", "report-2", "report-3", "report-2-2"]);
    }

    #[test]
    fn test_expand_inputs_keeps_urls_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("c.csv"), "c").unwrap();

        let pattern = dir.path().join("*.txt").to_string_lossy().into_owned();
        let inputs = vec![
            "https://example.com/x?.pdf".to_string(),
            "plain.docx".to_string(),
            pattern,
        ];

        let locations = expand_inputs(&inputs).unwrap();
        assert_eq!(locations.len(), 4);
        assert_eq!(locations[0], "https://example.com/x?.pdf");
        assert_eq!(locations[1], "plain.docx");
        assert!(locations[2].ends_with("a.txt"));
        assert!(locations[3].ends_with("b.txt"));
    }
}
