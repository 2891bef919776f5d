//! CLI commands.

pub mod batch;
pub mod config;
pub mod extract;

use std::path::Path;

use clap::Args;
use tracing::debug;

use grabber_core::{ExtractionOverrides, GrabberConfig};

/// PDF extraction options shared by `extract` and `batch`.
#[derive(Args, Debug, Clone, Default)]
pub struct PdfOptionArgs {
    /// Allow OCR fallback even if the configuration disables it
    #[arg(long, conflicts_with = "no_ocr")]
    ocr: bool,

    /// Never run OCR, use only the embedded text layer
    #[arg(long)]
    no_ocr: bool,

    /// Render scale for OCR
    #[arg(long)]
    scale: Option<f32>,

    /// OCR language code (repeat for several, e.g. --lang eng --lang deu)
    #[arg(short, long = "lang")]
    languages: Vec<String>,

    /// Minimum text-layer length (characters) to skip OCR
    #[arg(long)]
    min_text_length: Option<usize>,
}

impl PdfOptionArgs {
    pub fn overrides(&self) -> ExtractionOverrides {
        ExtractionOverrides {
            ocr_enabled: match (self.ocr, self.no_ocr) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            scale: self.scale,
            languages: (!self.languages.is_empty()).then(|| self.languages.clone()),
            min_text_length: self.min_text_length,
        }
    }
}

/// Load the configuration from `config_path`, the default location, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<GrabberConfig> {
    if let Some(path) = config_path {
        return Ok(GrabberConfig::from_file(Path::new(path))?);
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using configuration from {}", default_path.display());
        Ok(GrabberConfig::from_file(&default_path)?)
    } else {
        Ok(GrabberConfig::default())
    }
}

/// Load the configuration and apply command-line PDF overrides.
pub fn resolve_config(
    config_path: Option<&str>,
    pdf_args: &PdfOptionArgs,
) -> anyhow::Result<GrabberConfig> {
    let mut config = load_config(config_path)?;
    config.pdf = config.pdf.merged(&pdf_args.overrides());
    config.pdf.validate()?;
    Ok(config)
}
