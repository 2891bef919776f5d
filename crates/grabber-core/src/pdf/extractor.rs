//! Two-phase PDF text extraction: text layer first, OCR as fallback.

use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, error, info, trace, warn};

use super::render::PageRenderer;
use super::{PdfDocument, PdftoppmRenderer, text_layer};
use crate::config::{ExtractionOptions, GrabberConfig};
use crate::error::{ExtractionError, OcrError};
use crate::ocr::{RECOGNIZING_TEXT, RecognitionEngine, RecognitionProgress, RecognitionRequest, TesseractEngine};

/// Extracts plain text from PDF buffers.
///
/// The choice between the text layer and OCR is made once per document from
/// the combined, trimmed text layer. Per-page work in both phases is started
/// for every page before any result is awaited, and results are joined in
/// page order.
pub struct PdfTextExtractor {
    options: ExtractionOptions,
    renderer: Arc<dyn PageRenderer>,
    engine: Arc<dyn RecognitionEngine>,
}

impl PdfTextExtractor {
    /// Create an extractor from explicit collaborators.
    pub fn new(
        options: ExtractionOptions,
        renderer: Arc<dyn PageRenderer>,
        engine: Arc<dyn RecognitionEngine>,
    ) -> Self {
        Self {
            options,
            renderer,
            engine,
        }
    }

    /// Create an extractor using `pdftoppm` and `tesseract` as configured.
    pub fn from_config(config: &GrabberConfig) -> Self {
        Self::new(
            config.pdf.clone(),
            Arc::new(PdftoppmRenderer::new(config.renderer.clone())),
            Arc::new(TesseractEngine::new(config.tesseract.clone())),
        )
    }

    /// Extract the text of a PDF buffer.
    ///
    /// Either the full text is returned or exactly one error; partial text is
    /// never returned.
    pub async fn extract(&self, buffer: &[u8]) -> Result<String, ExtractionError> {
        let result = self.extract_inner(buffer).await;
        if let Err(e) = &result {
            error!("Error in extract_pdf_text: {}", e);
        }
        result
    }

    async fn extract_inner(&self, buffer: &[u8]) -> Result<String, ExtractionError> {
        self.options.validate()?;

        let data = buffer.to_vec();
        let document = tokio::task::spawn_blocking(move || PdfDocument::decode(&data))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
            .map_err(ExtractionError::Decode)?;
        let document = Arc::new(document);

        let normal_text = self.read_text_layer(&document).await?;
        self.resolve(&document, normal_text).await
    }

    /// Decide between the text layer and OCR for a decoded document.
    async fn resolve(
        &self,
        document: &PdfDocument,
        normal_text: String,
    ) -> Result<String, ExtractionError> {
        if !self.options.ocr_enabled {
            return Ok(normal_text);
        }

        let length = normal_text.chars().count();
        if length > self.options.min_text_length {
            debug!(
                "Text layer has {} chars (threshold {}), skipping OCR",
                length, self.options.min_text_length
            );
            return Ok(normal_text);
        }

        info!("No regular text found in PDF, attempting OCR...");
        self.ocr_document(document)
            .await
            .map_err(ExtractionError::Ocr)
    }

    /// Read every page's text layer in parallel.
    ///
    /// A failure on any page yields an empty string for the whole document.
    async fn read_text_layer(&self, document: &Arc<PdfDocument>) -> Result<String, ExtractionError> {
        let handles: Vec<_> = document
            .page_numbers()
            .map(|page| {
                let document = Arc::clone(document);
                tokio::task::spawn_blocking(move || text_layer::read_page_text(&document, page))
            })
            .collect();

        let results = try_join_all(handles)
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?;

        Ok(combine_pages(results))
    }

    async fn ocr_document(&self, document: &PdfDocument) -> Result<String, OcrError> {
        let languages = self.options.language_spec();
        let pages = document
            .page_numbers()
            .map(|page| self.ocr_page(document, page, &languages));

        let texts = try_join_all(pages).await?;
        Ok(texts.join("\n").trim().to_string())
    }

    async fn ocr_page(
        &self,
        document: &PdfDocument,
        page: u32,
        languages: &str,
    ) -> Result<String, OcrError> {
        let raster = self.renderer.render(document, page, self.options.scale).await?;

        let encode_err = |reason: String| OcrError::Encode { page, reason };
        let image = tokio::task::spawn_blocking(move || raster.encode_png())
            .await
            .map_err(|e| encode_err(e.to_string()))?
            .map_err(|e| encode_err(e.to_string()))?;

        info!("Processing page {} with OCR...", page);

        let on_progress = move |event: RecognitionProgress| {
            if event.status == RECOGNIZING_TEXT {
                debug!("OCR Progress: {:.0}%", event.percent());
            } else {
                trace!("Page {}: {} ({:.0}%)", page, event.status, event.percent());
            }
        };
        let request = RecognitionRequest {
            page,
            image: &image,
            languages,
        };

        let recognition = self.engine.recognize(request, &on_progress).await?;
        Ok(recognition.text)
    }
}

/// Join per-page text layers in page order.
///
/// Any failed page discards the whole layer, leaving the decision to OCR.
fn combine_pages(pages: Vec<super::Result<String>>) -> String {
    match pages.into_iter().collect::<super::Result<Vec<_>>>() {
        Ok(pages) => pages.join("\n").trim().to_string(),
        Err(e) => {
            warn!("Error extracting text layer: {}", e);
            String::new()
        }
    }
}

impl std::fmt::Debug for PdfTextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfTextExtractor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
