//! PDF processing module.
//!
//! Text is taken from the embedded text layer when there is enough of it;
//! otherwise every page is rendered and sent through a recognition engine.

mod document;
mod extractor;
pub mod render;
pub mod text_layer;

pub use document::PdfDocument;
pub use extractor::PdfTextExtractor;
pub use render::{EncodedImage, PageRenderer, PdftoppmRenderer, RasterImage};
pub use text_layer::{TextContent, TextItem, TextRun};

#[cfg(test)]
pub(crate) use document::fixtures;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;
