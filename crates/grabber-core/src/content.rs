//! Content-type dispatch.

use std::fmt;
use std::path::Path;

use crate::error::{GrabberError, Result};

/// The formats the grabber can extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    PlainText,
    Docx,
    Pdf,
    Csv,
    Xlsx,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::PlainText,
        ContentKind::Docx,
        ContentKind::Pdf,
        ContentKind::Csv,
        ContentKind::Xlsx,
    ];

    /// The MIME type handled by this kind.
    pub fn mime_type(self) -> &'static str {
        match self {
            ContentKind::PlainText => "text/plain",
            ContentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ContentKind::Pdf => "application/pdf",
            ContentKind::Csv => "text/csv",
            ContentKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Usual file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::PlainText => "txt",
            ContentKind::Docx => "docx",
            ContentKind::Pdf => "pdf",
            ContentKind::Csv => "csv",
            ContentKind::Xlsx => "xlsx",
        }
    }

    /// Resolve a declared content type such as `text/csv; charset=utf-8`.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let essence = normalize_content_type(content_type);
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime_type() == essence)
            .ok_or(GrabberError::UnsupportedContentType(essence))
    }

    /// Guess the kind of a local file from its extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(ContentKind::PlainText),
            _ => Self::ALL.into_iter().find(|kind| kind.extension() == ext),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Lowercase a content type and strip its parameters.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_parameters() {
        assert_eq!(normalize_content_type(" Text/CSV; charset=utf-8"), "text/csv");
        assert_eq!(normalize_content_type("application/pdf"), "application/pdf");
        assert_eq!(normalize_content_type(""), "");
    }

    #[test]
    fn test_from_content_type() {
        assert_eq!(
            ContentKind::from_content_type("text/csv; charset=utf-8").unwrap(),
            ContentKind::Csv
        );
        assert_eq!(
            ContentKind::from_content_type("APPLICATION/PDF").unwrap(),
            ContentKind::Pdf
        );
        for kind in ContentKind::ALL {
            assert_eq!(ContentKind::from_content_type(kind.mime_type()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_content_type() {
        let err = ContentKind::from_content_type("image/png").unwrap_err();
        assert!(matches!(err, GrabberError::UnsupportedContentType(ref t) if t == "image/png"));
        assert_eq!(err.to_string(), "unsupported content type: image/png");

        assert!(ContentKind::from_content_type("").is_err());
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(
            ContentKind::from_extension(Path::new("report.PDF")),
            Some(ContentKind::Pdf)
        );
        assert_eq!(
            ContentKind::from_extension(Path::new("/tmp/notes.txt")),
            Some(ContentKind::PlainText)
        );
        assert_eq!(
            ContentKind::from_extension(Path::new("sheet.xlsx")),
            Some(ContentKind::Xlsx)
        );
        assert_eq!(ContentKind::from_extension(Path::new("archive.tar")), None);
        assert_eq!(ContentKind::from_extension(Path::new("Makefile")), None);
    }
}
