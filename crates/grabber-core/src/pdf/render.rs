//! Page rasterization for the OCR path.

use std::io::Cursor;
use std::process::Stdio;

use futures_util::future::BoxFuture;
use image::codecs::png::PngEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use tokio::process::Command;
use tracing::{debug, trace};

use super::PdfDocument;
use crate::config::RendererConfig;
use crate::error::OcrError;

/// Renders single pages of a decoded document to raster images.
pub trait PageRenderer: Send + Sync {
    /// Render `page` (1-based) at `scale` magnification.
    fn render<'a>(
        &'a self,
        document: &'a PdfDocument,
        page: u32,
        scale: f32,
    ) -> BoxFuture<'a, Result<RasterImage, OcrError>>;
}

/// An RGBA8 raster image of a rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// A PNG-encoded page image, ready to hand to a recognition engine.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RasterImage {
    /// Convert any decoded image to RGBA8.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }

    /// Decode a PNG produced by a renderer.
    pub fn from_png(data: &[u8]) -> Result<Self, image::ImageError> {
        image::load_from_memory_with_format(data, ImageFormat::Png).map(Self::from_dynamic)
    }

    /// Encode as PNG.
    pub fn encode_png(&self) -> Result<EncodedImage, image::ImageError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(image::ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }

        let mut png = Vec::new();
        PngEncoder::new(Cursor::new(&mut png)).write_image(
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(EncodedImage {
            width: self.width,
            height: self.height,
            png,
        })
    }
}

/// Renderer backed by poppler's `pdftoppm`.
///
/// All pages read the document's single staged copy on disk; each call runs
/// one `pdftoppm` process writing into its own temporary directory. The child
/// is killed if the render future is dropped.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    config: RendererConfig,
}

impl PdftoppmRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    async fn render_page(
        &self,
        document: &PdfDocument,
        page: u32,
        scale: f32,
    ) -> Result<RasterImage, OcrError> {
        let render_err = |reason: String| OcrError::Render { page, reason };

        let input = document
            .staged_path()
            .await
            .map_err(|e| render_err(format!("failed to stage document: {}", e)))?;
        let dir = tempfile::tempdir()
            .map_err(|e| render_err(format!("failed to create temp dir: {}", e)))?;
        let output_root = dir.path().join("page");

        let dpi = self.config.dpi_for_scale(scale);
        trace!("Rendering page {} at {} dpi", page, dpi);

        let output = Command::new(&self.config.program)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-singlefile")
            .arg(input)
            .arg(&output_root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OcrError::EngineUnavailable(format!(
                        "{} not found; install poppler-utils",
                        self.config.program.display()
                    ))
                } else {
                    render_err(format!("failed to run {}: {}", self.config.program.display(), e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(render_err(format!(
                "{} exited with {}: {}",
                self.config.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let png = tokio::fs::read(output_root.with_extension("png"))
            .await
            .map_err(|e| render_err(format!("no image produced: {}", e)))?;
        let raster = RasterImage::from_png(&png).map_err(|e| render_err(e.to_string()))?;

        debug!("Rendered page {}: {}x{}", page, raster.width, raster.height);
        Ok(raster)
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render<'a>(
        &'a self,
        document: &'a PdfDocument,
        page: u32,
        scale: f32,
    ) -> BoxFuture<'a, Result<RasterImage, OcrError>> {
        Box::pin(self.render_page(document, page, scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn checkerboard() -> RasterImage {
        let image = RgbaImage::from_fn(4, 3, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        RasterImage::from_dynamic(DynamicImage::ImageRgba8(image))
    }

    #[test]
    fn test_png_encoding_preserves_pixels() {
        let raster = checkerboard();
        let encoded = raster.encode_png().unwrap();

        assert_eq!((encoded.width, encoded.height), (4, 3));
        assert!(encoded.png.starts_with(b"\x89PNG"));
        assert_eq!(RasterImage::from_png(&encoded.png).unwrap(), raster);
    }

    #[test]
    fn test_encoding_rejects_short_buffer() {
        let raster = RasterImage {
            width: 10,
            height: 10,
            pixels: vec![0; 12],
        };
        assert!(raster.encode_png().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pdftoppm_renderer_reads_singlefile_output() {
        use crate::pdf::document::fixtures::pdf_with_pages;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.png");
        std::fs::write(&fixture, checkerboard().encode_png().unwrap().png).unwrap();

        // Stand-in for pdftoppm: copy the fixture to "<output root>.png"
        let program = dir.path().join("fake-pdftoppm");
        std::fs::write(
            &program,
            format!(
                "#!/bin/sh\nfor last; do :; done\ncp '{}' \"$last.png\"\n",
                fixture.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let renderer = PdftoppmRenderer::new(RendererConfig {
            program,
            ..Default::default()
        });
        let document = PdfDocument::decode(&pdf_with_pages(&[&["page"]])).unwrap();

        let raster = renderer.render(&document, 1, 2.0).await.unwrap();
        assert_eq!((raster.width, raster.height), (4, 3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pages_share_one_staged_document() {
        use crate::pdf::document::fixtures::pdf_with_pages;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.png");
        std::fs::write(&fixture, checkerboard().encode_png().unwrap().png).unwrap();
        let log = dir.path().join("inputs.log");

        // Record the input argument, then behave like the stand-in above
        let program = dir.path().join("fake-pdftoppm");
        std::fs::write(
            &program,
            format!(
                "#!/bin/sh\necho \"$9\" >> '{}'\nfor last; do :; done\ncp '{}' \"$last.png\"\n",
                log.display(),
                fixture.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let renderer = PdftoppmRenderer::new(RendererConfig {
            program,
            ..Default::default()
        });
        let document = PdfDocument::decode(&pdf_with_pages(&[&["one"], &["two"], &["three"]])).unwrap();

        let (a, b, c) = tokio::join!(
            renderer.render(&document, 1, 1.0),
            renderer.render(&document, 2, 1.0),
            renderer.render(&document, 3, 1.0),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        let staged = document.staged_path().await.unwrap().display().to_string();
        let inputs = std::fs::read_to_string(&log).unwrap();
        let inputs: Vec<&str> = inputs.lines().collect();
        assert_eq!(inputs, vec![staged.as_str(); 3]);
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        use crate::pdf::document::fixtures::pdf_with_pages;

        let renderer = PdftoppmRenderer::new(RendererConfig {
            program: "definitely-not-a-real-pdftoppm".into(),
            ..Default::default()
        });
        let document = PdfDocument::decode(&pdf_with_pages(&[&["page"]])).unwrap();

        let err = renderer.render(&document, 1, 1.0).await.unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable(_)));
    }
}
