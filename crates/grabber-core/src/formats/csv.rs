//! CSV files, one JSON object per record.

use serde_json::{Map, Value};

use crate::error::FormatError;

/// Convert a CSV file with a header row into newline-separated JSON objects.
///
/// Keys follow header order. Short records emit only the fields they have;
/// fields beyond the header are keyed `_<index>`.
pub fn extract(data: &[u8]) -> Result<String, FormatError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let mut lines = Vec::new();

    for record in reader.records() {
        let record = record?;
        let mut object = Map::with_capacity(record.len());
        for (index, field) in record.iter().enumerate() {
            let key = headers
                .get(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("_{}", index));
            object.insert(key, Value::String(field.to_string()));
        }
        lines.push(serde_json::to_string(&object)?);
    }

    Ok(lines.join("\n"))
}
