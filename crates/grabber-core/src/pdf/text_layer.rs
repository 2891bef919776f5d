//! Embedded text layer reading.
//!
//! A page's text layer is read straight from its content stream(s) as a flat
//! sequence of [`TextItem`]s: text runs produced by the text-showing operators
//! and marked-content boundaries. Items come out in content-stream order; no
//! attempt is made to reconstruct visual reading order.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object};
use tracing::trace;

use super::{PdfDocument, Result};
use crate::error::PdfError;

/// Kerning adjustment (thousandths of an em) treated as a word gap in `TJ`.
const WORD_GAP_THRESHOLD: f32 = -200.0;

/// Maximum nesting of form XObjects followed via `Do`.
const MAX_FORM_DEPTH: usize = 8;

/// Structured text content of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

/// One item of a page's text content.
#[derive(Debug, Clone, PartialEq)]
pub enum TextItem {
    /// Text shown by a single text-showing operator.
    Run(TextRun),
    /// A marked-content boundary (`BMC`/`BDC`/`EMC`).
    MarkedContent {
        kind: MarkedContentKind,
        tag: Option<String>,
    },
}

/// A run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkedContentKind {
    Begin,
    End,
}

impl TextContent {
    /// Text runs joined with a single space. Marked content contributes nothing.
    pub fn joined(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                TextItem::Run(run) => Some(run.text.as_str()),
                TextItem::MarkedContent { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Read the text layer of a page and join its runs.
pub fn read_page_text(doc: &PdfDocument, page: u32) -> Result<String> {
    Ok(read_text_content(doc, page)?.joined())
}

/// Read the structured text content of a page.
pub fn read_text_content(doc: &PdfDocument, page: u32) -> Result<TextContent> {
    let page_id = doc.page_id(page)?;
    let lopdf_doc = doc.inner();

    let data = lopdf_doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::TextLayer {
            page,
            reason: e.to_string(),
        })?;
    let content = Content::decode(&data).map_err(|e| PdfError::TextLayer {
        page,
        reason: e.to_string(),
    })?;

    let resources = doc.page_resources(page_id);
    let fonts = font_decoder(lopdf_doc, resources.and_then(|r| doc.resource_dict(r, b"Font")));
    let scope = Scope {
        resources,
        fonts: &fonts,
    };

    let mut items = Vec::new();
    walk(doc, &content.operations, &scope, 0, &mut items);

    trace!("Page {}: {} text items", page, items.len());
    Ok(TextContent { items })
}

type FontDecoder<'a> = dyn Fn(&[u8], &[u8]) -> Option<String> + 'a;

/// Resources visible to the content stream being walked.
struct Scope<'a> {
    resources: Option<&'a Dictionary>,
    fonts: &'a FontDecoder<'a>,
}

/// Build a decoder mapping `(font resource name, string bytes)` to text.
fn font_decoder<'a>(
    doc: &'a Document,
    fonts: Option<&'a Dictionary>,
) -> impl Fn(&[u8], &[u8]) -> Option<String> + 'a {
    let encodings: BTreeMap<Vec<u8>, _> = fonts
        .into_iter()
        .flat_map(|dict| dict.iter())
        .filter_map(|(name, font)| {
            let font = match doc.dereference(font) {
                Ok((_, Object::Dictionary(font))) => font,
                _ => return None,
            };
            match font.get_font_encoding(doc) {
                Ok(encoding) => Some((name.clone(), encoding)),
                Err(e) => {
                    trace!("No usable encoding for font {}: {}", String::from_utf8_lossy(name), e);
                    None
                }
            }
        })
        .collect();

    move |font: &[u8], bytes: &[u8]| {
        let encoding = encodings.get(font)?;
        Document::decode_text(encoding, bytes).ok()
    }
}

fn walk(
    doc: &PdfDocument,
    operations: &[Operation],
    scope: &Scope<'_>,
    depth: usize,
    items: &mut Vec<TextItem>,
) {
    let mut current_font: Vec<u8> = Vec::new();

    for operation in operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "Tf" => {
                if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                    current_font = name.to_vec();
                }
            }
            "Tj" | "'" => {
                if let Some(Object::String(bytes, _)) = operands.last() {
                    push_run(items, decode(scope, &current_font, bytes));
                }
            }
            "\"" => {
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    push_run(items, decode(scope, &current_font, bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = operands.first() {
                    push_run(items, decode_array(scope, &current_font, elements));
                }
            }
            "BMC" | "BDC" => items.push(TextItem::MarkedContent {
                kind: MarkedContentKind::Begin,
                tag: operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .map(|n| String::from_utf8_lossy(n).into_owned()),
            }),
            "EMC" => items.push(TextItem::MarkedContent {
                kind: MarkedContentKind::End,
                tag: None,
            }),
            "Do" => {
                if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                    walk_form(doc, name, scope, depth, items);
                }
            }
            _ => {}
        }
    }
}

fn walk_form(
    doc: &PdfDocument,
    name: &[u8],
    scope: &Scope<'_>,
    depth: usize,
    items: &mut Vec<TextItem>,
) {
    if depth >= MAX_FORM_DEPTH {
        trace!("Form XObject nesting too deep, skipping {}", String::from_utf8_lossy(name));
        return;
    }

    let lopdf_doc = doc.inner();
    let Some(xobjects) = scope.resources.and_then(|r| doc.resource_dict(r, b"XObject")) else {
        return;
    };
    let stream = match xobjects.get(name).map(|o| lopdf_doc.dereference(o)) {
        Ok(Ok((_, Object::Stream(stream)))) => stream,
        _ => return,
    };
    let is_form = stream
        .dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map(|subtype| subtype == b"Form")
        .unwrap_or(false);
    if !is_form {
        return;
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let content = match Content::decode(&data) {
        Ok(content) => content,
        Err(e) => {
            trace!("Skipping undecodable form XObject: {}", e);
            return;
        }
    };

    let own_resources = match stream.dict.get(b"Resources").map(|o| lopdf_doc.dereference(o)) {
        Ok(Ok((_, Object::Dictionary(dict)))) => Some(dict),
        _ => None,
    };
    let own_fonts = font_decoder(
        lopdf_doc,
        own_resources.and_then(|r| doc.resource_dict(r, b"Font")),
    );
    let parent_fonts = scope.fonts;
    let fonts = move |font: &[u8], bytes: &[u8]| {
        own_fonts(font, bytes).or_else(|| parent_fonts(font, bytes))
    };

    let form_scope = Scope {
        resources: own_resources.or(scope.resources),
        fonts: &fonts,
    };
    walk(doc, &content.operations, &form_scope, depth + 1, items);
}

fn push_run(items: &mut Vec<TextItem>, text: String) {
    items.push(TextItem::Run(TextRun { text }));
}

fn decode(scope: &Scope<'_>, font: &[u8], bytes: &[u8]) -> String {
    (scope.fonts)(font, bytes).unwrap_or_else(|| decode_fallback(bytes))
}

fn decode_array(scope: &Scope<'_>, font: &[u8], elements: &[Object]) -> String {
    let mut text = String::new();
    for element in elements {
        match element {
            Object::String(bytes, _) => text.push_str(&decode(scope, font, bytes)),
            Object::Integer(n) => push_gap(&mut text, *n as f32),
            Object::Real(n) => push_gap(&mut text, *n as f32),
            _ => {}
        }
    }
    text
}

fn push_gap(text: &mut String, adjustment: f32) {
    if adjustment < WORD_GAP_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
        text.push(' ');
    }
}

/// Decode a string without font information: UTF-16BE with BOM, else Latin-1.
fn decode_fallback(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    bytes.iter().map(|&b| b as char).collect()
}
