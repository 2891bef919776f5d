//! Excel (XLSX) workbooks, first sheet rendered as CSV.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Archive, open_archive, read_optional_part, read_part};
use crate::error::FormatError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Grid size of a worksheet.
const MAX_ROWS: u32 = 1_048_576;
const MAX_COLUMNS: u32 = 16_384;

/// Render the first sheet of a workbook as CSV.
///
/// Rows are separated by `\n` without a trailing newline. Cells are written
/// with their stored values: shared and inline strings, `TRUE`/`FALSE` for
/// booleans, numbers as stored and error codes such as `#DIV/0!`.
pub fn extract(data: &[u8]) -> Result<String, FormatError> {
    let mut archive = open_archive(data)?;
    let sheet_path = first_sheet_path(&mut archive)?;
    let shared = match read_optional_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet = read_part(&mut archive, &sheet_path)?;
    let cells = sheet_cells(&sheet, &shared)?;
    to_csv(&cells)
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, FormatError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| FormatError::Xml(e.to_string()))?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Locate the worksheet part of the first sheet listed in the workbook.
fn first_sheet_path(archive: &mut Archive<'_>) -> Result<String, FormatError> {
    let workbook = read_part(archive, WORKBOOK_PART)?;
    let mut reader = Reader::from_reader(workbook.as_slice());
    let mut buf = Vec::new();

    let relationship = loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                break attribute(&e, b"r:id")?;
            }
            Event::Eof => return Err(FormatError::NoSheets),
            _ => {}
        }
        buf.clear();
    };

    let fallback = "xl/worksheets/sheet1.xml".to_string();
    let Some(relationship) = relationship else {
        return Ok(fallback);
    };
    let Some(rels) = read_optional_part(archive, WORKBOOK_RELS_PART)? else {
        return Ok(fallback);
    };

    let mut reader = Reader::from_reader(rels.as_slice());
    buf.clear();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(relationship.as_str()) {
                    let target = attribute(&e, b"Target")?
                        .ok_or_else(|| FormatError::Xml("relationship without target".to_string()))?;
                    return Ok(resolve_target(&target));
                }
            }
            Event::Eof => return Err(FormatError::MissingPart(format!("sheet {}", relationship))),
            _ => {}
        }
        buf.clear();
    }
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Read the shared string table. Phonetic runs are skipped.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, FormatError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text => current.push_str(&e.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Parse a cell reference such as `B3` into zero-based `(row, column)`.
///
/// References outside the worksheet grid yield `None`.
fn parse_reference(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut column: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        column = column
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row > MAX_ROWS || column > MAX_COLUMNS {
        return None;
    }
    Some((row.checked_sub(1)?, column - 1))
}

/// Resolve an explicit `r` attribute of a cell.
fn cell_reference(reference: Option<String>) -> Result<Option<(u32, u32)>, FormatError> {
    match reference {
        Some(reference) => parse_reference(&reference)
            .map(Some)
            .ok_or_else(|| FormatError::Xml(format!("invalid cell reference {}", reference))),
        None => Ok(None),
    }
}

fn row_number(reference: Option<String>) -> Result<Option<u32>, FormatError> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    match reference.trim().parse::<u32>() {
        Ok(r) if (1..=MAX_ROWS).contains(&r) => Ok(Some(r - 1)),
        _ => Err(FormatError::Xml(format!("invalid row number {}", reference))),
    }
}

#[derive(Default)]
struct PendingCell {
    row: u32,
    column: u32,
    kind: Option<String>,
    value: String,
    inline: String,
}

impl PendingCell {
    fn resolve(self, shared: &[String]) -> String {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|index| shared.get(index).cloned())
                .unwrap_or_default(),
            Some("inlineStr") => self.inline,
            Some("b") => match self.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            },
            _ => self.value,
        }
    }
}

/// Collect the non-empty cells of a worksheet keyed by `(row, column)`.
fn sheet_cells(xml: &[u8], shared: &[String]) -> Result<BTreeMap<(u32, u32), String>, FormatError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cells = BTreeMap::new();

    let mut next_row: u32 = 0;
    let mut row: u32 = 0;
    let mut next_column: u32 = 0;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                row = row_number(attribute(&e, b"r")?)?.unwrap_or(next_row);
                next_row = row + 1;
                next_column = 0;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (cell_row, column) =
                    cell_reference(attribute(&e, b"r")?)?.unwrap_or((row, next_column));
                next_column = column + 1;
                cell = Some(PendingCell {
                    row: cell_row,
                    column,
                    kind: attribute(&e, b"t")?,
                    ..Default::default()
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let column = cell_reference(attribute(&e, b"r")?)?
                    .map_or(next_column, |(_, column)| column);
                next_column = column + 1;
            }
            Event::Start(e) => match e.local_name().as_ref() {
                b"v" => in_value = true,
                b"t" if cell.is_some() => in_inline = true,
                _ => {}
            },
            Event::Text(e) => {
                if let Some(pending) = cell.as_mut() {
                    if in_value {
                        pending.value.push_str(&e.unescape()?);
                    } else if in_inline {
                        pending.inline.push_str(&e.unescape()?);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let key = (pending.row, pending.column);
                        let value = pending.resolve(shared);
                        if !value.is_empty() {
                            cells.insert(key, value);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(cells)
}

/// Write the bounding range of `cells` as CSV.
fn to_csv(cells: &BTreeMap<(u32, u32), String>) -> Result<String, FormatError> {
    let Some(first_row) = cells.keys().map(|(row, _)| *row).min() else {
        return Ok(String::new());
    };
    let last_row = cells.keys().map(|(row, _)| *row).max().unwrap_or(first_row);
    let first_column = cells.keys().map(|(_, column)| *column).min().unwrap_or(0);
    let last_column = cells.keys().map(|(_, column)| *column).max().unwrap_or(first_column);

    let mut lines = Vec::new();
    for row in first_row..=last_row {
        let fields: Vec<&str> = (first_column..=last_column)
            .map(|column| cells.get(&(row, column)).map_or("", String::as_str))
            .collect();
        lines.push(csv_line(&fields)?);
    }

    Ok(lines.join("\n"))
}

fn csv_line(fields: &[&str]) -> Result<String, FormatError> {
    // A lone empty field would otherwise be written as `""`
    if fields.iter().all(|field| field.is_empty()) {
        return Ok(",".repeat(fields.len().saturating_sub(1)));
    }

    let mut writer = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| FormatError::Csv(e.into_error().into()))?;

    let line = String::from_utf8_lossy(&bytes);
    Ok(line.strip_suffix('\n').unwrap_or(&line).to_string())
}
