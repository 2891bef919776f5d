//! Text extraction for the non-PDF formats.
//!
//! Each handler takes the raw file bytes and returns plain text. The handlers
//! are synchronous; callers run them on a blocking thread.

pub mod csv;
pub mod docx;
pub mod text;
pub mod xlsx;

use std::io::{Cursor, Read};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::FormatError;

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Open an OOXML container.
pub(crate) fn open_archive(data: &[u8]) -> Result<Archive<'_>, FormatError> {
    Ok(ZipArchive::new(Cursor::new(data))?)
}

/// Read a part of an OOXML container, if present.
pub(crate) fn read_optional_part(
    archive: &mut Archive<'_>,
    name: &str,
) -> Result<Option<Vec<u8>>, FormatError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)
        .map_err(|e| FormatError::Archive(ZipError::Io(e)))?;
    Ok(Some(data))
}

/// Read a required part of an OOXML container.
pub(crate) fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, FormatError> {
    read_optional_part(archive, name)?.ok_or_else(|| FormatError::MissingPart(name.to_string()))
}
