//! Raw text of Word (DOCX) documents.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{open_archive, read_part};
use crate::error::FormatError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the raw text of a DOCX document.
///
/// Every paragraph is followed by a blank line. Tabs and line breaks inside
/// paragraphs are kept; all formatting is dropped.
pub fn extract(data: &[u8]) -> Result<String, FormatError> {
    let mut archive = open_archive(data)?;
    let document = read_part(&mut archive, DOCUMENT_PART)?;
    document_text(&document)
}

fn document_text(xml: &[u8]) -> Result<String, FormatError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.name().as_ref() == b"w:t" {
                    in_text = true;
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Text(e) if in_text => text.push_str(&e.unescape()?),
            Event::CData(e) if in_text => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
