//! Decoded PDF document handle.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tempfile::TempPath;
use tokio::sync::OnceCell;
use tracing::debug;

use super::Result;
use crate::error::PdfError;

/// An in-memory decoded PDF.
///
/// Pages are numbered from 1, matching [`Document::get_pages`]. The handle is
/// read-only once decoded and can be shared across tasks behind an `Arc`.
#[derive(Debug)]
pub struct PdfDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
    raw_data: Vec<u8>,
    /// On-disk copy for external renderers, removed on drop.
    staged: OnceCell<TempPath>,
}

impl PdfDocument {
    /// Decode a PDF from bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(PdfError::Decode("invalid PDF buffer".to_string()));
        }

        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Decode(e.to_string()))?;

        // Handle PDFs with empty password encryption
        let raw_data = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // Renderers get the decrypted bytes
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Decode(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", pages.len());
        Ok(Self {
            document: doc,
            pages,
            raw_data,
            staged: OnceCell::new(),
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page numbers in document order.
    pub fn page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    /// Bytes of the (decrypted) document, for renderers that reparse it.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_data
    }

    /// Path of a temporary file holding [`raw_bytes`](Self::raw_bytes).
    ///
    /// The file is written on first use and shared by later callers; it is
    /// removed when the document is dropped.
    pub async fn staged_path(&self) -> std::io::Result<&Path> {
        let data = &self.raw_data;
        let path: &Path = self
            .staged
            .get_or_try_init(|| async move {
                let path = tempfile::Builder::new()
                    .prefix("grabber-")
                    .suffix(".pdf")
                    .tempfile()?
                    .into_temp_path();
                tokio::fs::write(&path, data).await?;
                debug!("Staged {} bytes at {}", data.len(), path.display());
                Ok::<_, std::io::Error>(path)
            })
            .await?;
        Ok(path)
    }

    pub(crate) fn inner(&self) -> &Document {
        &self.document
    }

    pub(crate) fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages.get(&page).copied().ok_or(PdfError::InvalidPage(page))
    }

    /// Get resources dictionary for a page, handling inheritance
    pub(crate) fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut node_id = page_id;
        // Page trees are shallow; the bound only guards against cycles
        for _ in 0..32 {
            let dict = self.document.get_object(node_id).ok()?.as_dict().ok()?;

            if let Ok(resources) = dict.get(b"Resources") {
                if let Ok((_, Object::Dictionary(res_dict))) = self.document.dereference(resources) {
                    return Some(res_dict);
                }
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => node_id = *parent_id,
                _ => return None,
            }
        }
        None
    }

    /// Resolve a named entry of a resources dictionary (e.g. `Font`, `XObject`).
    pub(crate) fn resource_dict<'a>(
        &'a self,
        resources: &'a Dictionary,
        key: &[u8],
    ) -> Option<&'a Dictionary> {
        let entry = resources.get(key).ok()?;
        match self.document.dereference(entry) {
            Ok((_, Object::Dictionary(dict))) => Some(dict),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory PDFs for tests.

    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build a PDF whose pages each show the given strings with `Tj`.
    pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
        let page_ops: Vec<Vec<Operation>> = pages
            .iter()
            .map(|runs| {
                let mut ops = vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                ];
                for run in runs.iter() {
                    ops.push(Operation::new("Tj", vec![Object::string_literal(*run)]));
                }
                ops.push(Operation::new("ET", vec![]));
                ops
            })
            .collect();
        pdf_with_operations(page_ops)
    }

    /// Build a PDF from raw content-stream operations, one list per page.
    pub fn pdf_with_operations(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::with_capacity(pages.len());
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save PDF");
        buffer
    }
}
