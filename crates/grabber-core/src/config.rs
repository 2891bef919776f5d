//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ExtractionError;

/// Main configuration for the grabber pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    /// PDF extraction options.
    pub pdf: ExtractionOptions,

    /// Page renderer configuration.
    pub renderer: RendererConfig,

    /// Recognition engine configuration.
    pub tesseract: TesseractConfig,

    /// Retrieval configuration.
    pub fetch: FetchConfig,
}

/// Options for a single PDF extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// Fall back to OCR when the text layer is too short.
    pub ocr_enabled: bool,

    /// Render magnification factor for OCR.
    pub scale: f32,

    /// OCR language codes, passed through to the engine.
    pub languages: Vec<String>,

    /// Minimum trimmed text-layer length (in characters) to skip OCR.
    pub min_text_length: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            scale: 2.0,
            languages: vec!["eng".to_string()],
            min_text_length: 50,
        }
    }
}

/// Caller-supplied overrides, merged field by field over [`ExtractionOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOverrides {
    pub ocr_enabled: Option<bool>,
    pub scale: Option<f32>,
    pub languages: Option<Vec<String>>,
    pub min_text_length: Option<usize>,
}

impl ExtractionOptions {
    /// Merge overrides over these options. Set fields win.
    pub fn merged(&self, overrides: &ExtractionOverrides) -> Self {
        Self {
            ocr_enabled: overrides.ocr_enabled.unwrap_or(self.ocr_enabled),
            scale: overrides.scale.unwrap_or(self.scale),
            languages: overrides
                .languages
                .clone()
                .unwrap_or_else(|| self.languages.clone()),
            min_text_length: overrides.min_text_length.unwrap_or(self.min_text_length),
        }
    }

    /// Language spec handed to the recognition engine, e.g. `eng+deu`.
    pub fn language_spec(&self) -> String {
        self.languages.join("+")
    }

    /// Check that the options can drive an extraction.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ExtractionError::InvalidOptions(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }

        if self.languages.is_empty() {
            return Err(ExtractionError::InvalidOptions(
                "at least one OCR language is required".to_string(),
            ));
        }

        if let Some(bad) = self
            .languages
            .iter()
            .find(|code| code.is_empty() || code.contains('+') || code.contains(char::is_whitespace))
        {
            return Err(ExtractionError::InvalidOptions(format!(
                "invalid language code: {:?}",
                bad
            )));
        }

        Ok(())
    }
}

/// Configuration for the `pdftoppm` page renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Path or name of the `pdftoppm` executable.
    pub program: PathBuf,

    /// Resolution corresponding to a scale of 1.0.
    pub base_dpi: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pdftoppm"),
            base_dpi: 72.0,
        }
    }
}

impl RendererConfig {
    /// Render resolution for the given magnification.
    pub fn dpi_for_scale(&self, scale: f32) -> u32 {
        (self.base_dpi * scale).round().max(1.0) as u32
    }
}

/// Configuration for the `tesseract` recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Path or name of the `tesseract` executable.
    pub program: PathBuf,

    /// Page segmentation mode (`--psm`), engine default when unset.
    pub page_segmentation_mode: Option<u8>,

    /// Directory containing `*.traineddata` files.
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            page_segmentation_mode: None,
            tessdata_dir: None,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User agent sent with HTTP requests.
    pub user_agent: String,

    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("content-grabber/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl GrabberConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = ExtractionOptions::default();
        assert!(options.ocr_enabled);
        assert_eq!(options.scale, 2.0);
        assert_eq!(options.languages, vec!["eng".to_string()]);
        assert_eq!(options.min_text_length, 50);
    }

    #[test]
    fn test_merge_is_field_by_field() {
        let overrides = ExtractionOverrides {
            min_text_length: Some(0),
            languages: Some(vec!["eng".into(), "deu".into()]),
            ..Default::default()
        };

        let merged = ExtractionOptions::default().merged(&overrides);
        assert!(merged.ocr_enabled);
        assert_eq!(merged.scale, 2.0);
        assert_eq!(merged.min_text_length, 0);
        assert_eq!(merged.language_spec(), "eng+deu");
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let options: ExtractionOptions = serde_json::from_str(r#"{"ocr_enabled": false}"#).unwrap();
        assert!(!options.ocr_enabled);
        assert_eq!(options.min_text_length, 50);
        assert_eq!(options.languages, vec!["eng".to_string()]);
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let options = ExtractionOptions {
            scale: 0.0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(ExtractionError::InvalidOptions(_))));

        let options = ExtractionOptions {
            scale: f32::NAN,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_languages() {
        let options = ExtractionOptions {
            languages: vec![],
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = ExtractionOptions {
            languages: vec!["eng+deu".into()],
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_dpi_for_scale() {
        let config = RendererConfig::default();
        assert_eq!(config.dpi_for_scale(2.0), 144);
        assert_eq!(config.dpi_for_scale(1.0), 72);
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = GrabberConfig::default();
        config.pdf.min_text_length = 10;
        config.tesseract.page_segmentation_mode = Some(1);
        config.save(&path).unwrap();

        let loaded = GrabberConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pdf.min_text_length, 10);
        assert_eq!(loaded.tesseract.page_segmentation_mode, Some(1));
    }
}
