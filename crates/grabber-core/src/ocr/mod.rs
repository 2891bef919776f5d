//! Text recognition for pages without a usable text layer.

mod tesseract;

pub use tesseract::TesseractEngine;

use futures_util::future::BoxFuture;

use crate::error::OcrError;
use crate::pdf::EncodedImage;

/// Progress status reported while an engine is recognizing text.
pub const RECOGNIZING_TEXT: &str = "recognizing text";

/// A progress event from a recognition engine.
///
/// Engines may report any status; only [`RECOGNIZING_TEXT`] events are
/// surfaced by the PDF extractor. Values are not guaranteed to be monotonic.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionProgress {
    pub status: String,
    /// Fraction complete, in `[0, 1]`.
    pub progress: f32,
}

impl RecognitionProgress {
    pub fn new(status: impl Into<String>, progress: f32) -> Self {
        Self {
            status: status.into(),
            progress: progress.clamp(0.0, 1.0),
        }
    }

    /// Progress as a percentage for display.
    pub fn percent(&self) -> f32 {
        self.progress * 100.0
    }
}

/// Callback receiving progress events.
pub type ProgressSink<'a> = dyn Fn(RecognitionProgress) + Send + Sync + 'a;

/// A single page submitted for recognition.
#[derive(Debug, Clone, Copy)]
pub struct RecognitionRequest<'a> {
    /// Page number (1-based), for diagnostics.
    pub page: u32,
    pub image: &'a EncodedImage,
    /// Language codes joined with `+`, e.g. `eng+deu`.
    pub languages: &'a str,
}

/// Text recognized on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
}

/// An OCR engine.
pub trait RecognitionEngine: Send + Sync {
    /// Recognize the text in `request.image`, reporting progress to `on_progress`.
    fn recognize<'a>(
        &'a self,
        request: RecognitionRequest<'a>,
        on_progress: &'a ProgressSink<'a>,
    ) -> BoxFuture<'a, Result<Recognition, OcrError>>;
}
