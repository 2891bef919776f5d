//! Error types for the grabber-core library.

use thiserror::Error;

/// Main error type for whole-file extraction.
#[derive(Error, Debug)]
pub enum GrabberError {
    /// No location was given.
    #[error("file URL is required")]
    MissingLocation,

    /// The file could not be retrieved.
    #[error("failed to fetch file from {location}: {reason}")]
    Fetch { location: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP error! Status: {status} ({location})")]
    HttpStatus { location: String, status: u16 },

    /// Retrieval succeeded but produced no bytes.
    #[error("empty or invalid file content")]
    EmptyContent,

    /// No handler exists for the declared content type.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// PDF extraction error.
    #[error(transparent)]
    Pdf(#[from] ExtractionError),

    /// Error from one of the simple format handlers.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors surfaced by the PDF extraction orchestrator.
///
/// Exactly one of these is returned per failed document; partial text is
/// never returned alongside an error.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The buffer could not be decoded as a PDF document.
    #[error("failed to parse PDF: {0}")]
    Decode(#[source] PdfError),

    /// Rendering or recognition failed for at least one page.
    #[error("OCR failed: {0}")]
    Ocr(#[source] OcrError),

    /// The resolved extraction options are unusable.
    #[error("invalid extraction options: {0}")]
    InvalidOptions(String),

    /// A blocking worker task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Errors related to PDF decoding and text-layer reading.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("{0}")]
    Decode(String),

    /// The PDF is encrypted and cannot be opened with an empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// Reading the embedded text layer of a page failed.
    #[error("failed to read text layer of page {page}: {reason}")]
    TextLayer { page: u32, reason: String },
}

/// Errors related to the OCR fallback path.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Rasterizing a page failed.
    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// Encoding a rendered page for the recognition engine failed.
    #[error("failed to encode page {page}: {reason}")]
    Encode { page: u32, reason: String },

    /// The recognition engine failed on a page.
    #[error("text recognition failed on page {page}: {reason}")]
    Recognition { page: u32, reason: String },

    /// The renderer or engine program could not be started.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// Errors from the non-PDF format handlers.
#[derive(Error, Debug)]
pub enum FormatError {
    /// CSV parsing error.
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The OOXML container could not be opened.
    #[error("failed to open archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A part of the OOXML container was not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(String),

    /// A required part of the OOXML container is missing.
    #[error("missing document part: {0}")]
    MissingPart(String),

    /// The workbook contains no sheets.
    #[error("no sheets found in the Excel file")]
    NoSheets,

    /// Serializing a record failed.
    #[error("failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for FormatError {
    fn from(err: quick_xml::Error) -> Self {
        FormatError::Xml(err.to_string())
    }
}

/// Result type for the grabber library.
pub type Result<T> = std::result::Result<T, GrabberError>;
