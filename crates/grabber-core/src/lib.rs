//! Core library for content-grabber.
//!
//! This crate provides:
//! - Retrieval of files over HTTP(S) or from the local filesystem
//! - Dispatch on the declared content type
//! - Plain text, DOCX, CSV and XLSX text extraction
//! - PDF text extraction from the embedded text layer, with an OCR fallback
//!   through `pdftoppm` and `tesseract`

pub mod config;
pub mod content;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod formats;
pub mod ocr;
pub mod pdf;

pub use config::{
    ExtractionOptions, ExtractionOverrides, FetchConfig, GrabberConfig, RendererConfig,
    TesseractConfig,
};
pub use content::ContentKind;
pub use error::{ExtractionError, FormatError, GrabberError, OcrError, PdfError, Result};
pub use extractor::FileContentExtractor;
pub use fetch::{FetchedFile, Fetcher};
pub use ocr::{Recognition, RecognitionEngine, RecognitionProgress, TesseractEngine};
pub use pdf::{PageRenderer, PdfDocument, PdfTextExtractor, PdftoppmRenderer};

/// Fetch `location` and extract its text with the given configuration.
pub async fn fetch_file_content(location: &str, config: &GrabberConfig) -> Result<String> {
    FileContentExtractor::new(config)?.extract(location).await
}
