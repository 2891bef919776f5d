//! Recognition engine backed by the `tesseract` command-line program.

use std::process::Stdio;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{
    ProgressSink, RECOGNIZING_TEXT, Recognition, RecognitionEngine, RecognitionProgress,
    RecognitionRequest,
};
use crate::config::TesseractConfig;
use crate::error::OcrError;

/// Status reported before the child process is started.
const INITIALIZING: &str = "initializing tesseract";

/// OCR engine that pipes PNG pages through `tesseract stdin stdout`.
///
/// One child process is spawned per page, so pages submitted together are
/// recognized in parallel. The child is killed if the future is dropped.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn command(&self, languages: &str) -> Command {
        let mut command = Command::new(&self.config.program);
        command.arg("stdin").arg("stdout").arg("-l").arg(languages);

        if let Some(psm) = self.config.page_segmentation_mode {
            command.arg("--psm").arg(psm.to_string());
        }
        if let Some(dir) = &self.config.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(
        &self,
        request: RecognitionRequest<'_>,
        on_progress: &ProgressSink<'_>,
    ) -> Result<Recognition, OcrError> {
        let page = request.page;
        let recognition_err = |reason: String| OcrError::Recognition { page, reason };

        on_progress(RecognitionProgress::new(INITIALIZING, 0.0));

        let mut child = self.command(request.languages).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::EngineUnavailable(format!(
                    "{} not found; install tesseract-ocr",
                    self.config.program.display()
                ))
            } else {
                recognition_err(format!("failed to start {}: {}", self.config.program.display(), e))
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| recognition_err("stdin not captured".to_string()))?;

        on_progress(RecognitionProgress::new(RECOGNIZING_TEXT, 0.0));

        let png = &request.image.png;
        let feed = async move {
            stdin.write_all(png).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| recognition_err(e.to_string()))?;

        // The child may exit before reading all of stdin; its status and
        // stderr then carry the real failure.
        match fed {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Page {}: {} closed stdin early", page, self.config.program.display());
            }
            Err(e) if output.status.success() => return Err(recognition_err(e.to_string())),
            _ => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(recognition_err(format!(
                "{} exited with {}: {}",
                self.config.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        on_progress(RecognitionProgress::new(RECOGNIZING_TEXT, 1.0));

        // Tesseract terminates each page with a form feed
        let text = String::from_utf8_lossy(&output.stdout).replace('\u{c}', "");
        debug!("Page {}: recognized {} chars", page, text.chars().count());

        Ok(Recognition { text })
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

impl RecognitionEngine for TesseractEngine {
    fn recognize<'a>(
        &'a self,
        request: RecognitionRequest<'a>,
        on_progress: &'a ProgressSink<'a>,
    ) -> BoxFuture<'a, Result<Recognition, OcrError>> {
        info!(
            "Recognizing page {} ({}x{}, languages={})",
            request.page, request.image.width, request.image.height, request.languages
        );
        Box::pin(self.run(request, on_progress))
    }
}
