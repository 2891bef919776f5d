//! Whole-file extraction: retrieval, dispatch and the format handlers.

use tracing::{debug, error};

use crate::config::GrabberConfig;
use crate::content::ContentKind;
use crate::error::{GrabberError, Result};
use crate::fetch::Fetcher;
use crate::formats;
use crate::pdf::PdfTextExtractor;

/// Extracts plain text from a file given its location.
#[derive(Debug)]
pub struct FileContentExtractor {
    fetcher: Fetcher,
    pdf: PdfTextExtractor,
}

impl FileContentExtractor {
    pub fn new(config: &GrabberConfig) -> Result<Self> {
        Ok(Self::with_parts(
            Fetcher::new(&config.fetch)?,
            PdfTextExtractor::from_config(config),
        ))
    }

    pub fn with_parts(fetcher: Fetcher, pdf: PdfTextExtractor) -> Self {
        Self { fetcher, pdf }
    }

    /// Fetch `location` and extract its text using the declared content type.
    pub async fn extract(&self, location: &str) -> Result<String> {
        self.extract_inner(location, None).await
    }

    /// Like [`extract`](Self::extract), ignoring the declared content type.
    pub async fn extract_as(&self, location: &str, content_type: &str) -> Result<String> {
        self.extract_inner(location, Some(content_type)).await
    }

    async fn extract_inner(&self, location: &str, content_type: Option<&str>) -> Result<String> {
        if location.trim().is_empty() {
            return Err(GrabberError::MissingLocation);
        }

        let result = async {
            let file = self.fetcher.fetch(location).await?;
            let content_type = content_type.unwrap_or(&file.content_type);
            self.extract_bytes(file.bytes, content_type).await
        }
        .await;

        if let Err(e) = &result {
            error!("Failed to extract content from {}: {}", location, e);
        }
        result
    }

    /// Extract text from bytes already in memory.
    pub async fn extract_bytes(&self, data: Vec<u8>, content_type: &str) -> Result<String> {
        if data.is_empty() {
            return Err(GrabberError::EmptyContent);
        }

        let kind = ContentKind::from_content_type(content_type)?;
        debug!("Extracting {} bytes as {}", data.len(), kind);

        match kind {
            ContentKind::Pdf => Ok(self.pdf.extract(&data).await?),
            ContentKind::PlainText => Ok(formats::text::extract(&data)),
            ContentKind::Docx | ContentKind::Csv | ContentKind::Xlsx => {
                let text = tokio::task::spawn_blocking(move || match kind {
                    ContentKind::Docx => formats::docx::extract(&data),
                    ContentKind::Csv => formats::csv::extract(&data),
                    _ => formats::xlsx::extract(&data),
                })
                .await
                .map_err(std::io::Error::from)??;
                Ok(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionOptions;
    use crate::error::ExtractionError;
    use crate::formats::fixtures::archive;
    use crate::pdf::fixtures::pdf_with_pages;

    fn extractor() -> FileContentExtractor {
        let mut config = GrabberConfig::default();
        config.pdf = ExtractionOptions {
            ocr_enabled: false,
            ..Default::default()
        };
        FileContentExtractor::new(&config).unwrap()
    }

    fn write(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_missing_location() {
        let err = extractor().extract("").await.unwrap_err();
        assert!(matches!(err, GrabberError::MissingLocation));
        assert_eq!(err.to_string(), "file URL is required");
    }

    #[tokio::test]
    async fn test_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor();

        let csv = write(&dir, "people.csv", b"name,age\nAda,36\n");
        assert_eq!(
            extractor.extract(&csv).await.unwrap(),
            "{\"name\":\"Ada\",\"age\":\"36\"}"
        );

        let txt = write(&dir, "notes.txt", b"just text");
        assert_eq!(extractor.extract(&txt).await.unwrap(), "just text");

        let pdf = write(&dir, "doc.pdf", &pdf_with_pages(&[&["from", "pdf"]]));
        assert_eq!(extractor.extract(&pdf).await.unwrap(), "from pdf");

        let docx = archive(&[(
            "word/document.xml",
            "<w:document><w:body><w:p><w:r><w:t>docx</w:t></w:r></w:p></w:body></w:document>",
        )]);
        let docx = write(&dir, "letter.docx", &docx);
        assert_eq!(extractor.extract(&docx).await.unwrap(), "docx\n\n");
    }

    #[tokio::test]
    async fn test_content_type_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "data.bin", b"a,b\n1,2\n");
        let extractor = extractor();

        let err = extractor.extract(&path).await.unwrap_err();
        assert!(matches!(err, GrabberError::UnsupportedContentType(_)));

        let text = extractor
            .extract_as(&path, "text/csv; charset=utf-8")
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":\"1\",\"b\":\"2\"}");
    }

    #[tokio::test]
    async fn test_pdf_errors_are_wrapped() {
        let err = extractor()
            .extract_bytes(b"not a pdf".to_vec(), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, GrabberError::Pdf(ExtractionError::Decode(_))));
    }

    #[tokio::test]
    async fn test_empty_bytes() {
        let err = extractor()
            .extract_bytes(Vec::new(), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, GrabberError::EmptyContent));
    }

    #[tokio::test]
    async fn test_fetches_over_http() {
        let base = crate::fetch::test_server::serve_once(
            "200 OK",
            "text/plain; charset=utf-8",
            b"served text".to_vec(),
        )
        .await;

        let text = extractor().extract(&format!("{}/a", base)).await.unwrap();
        assert_eq!(text, "served text");
    }
}
