// CSV reader

use std::borrow::Cow;

use tracing::{debug, warn};

use super::{ParseError, RowMap};

const UTF8_BOM: &str = "\u{feff}";

/// Reads a CSV upload into header-keyed rows. Ragged rows are tolerated and fully
/// blank rows are skipped.
pub fn read_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<RowMap>, ParseError> {
    let content = decode(file_name, bytes);
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content.as_ref());

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ParseError::corrupt("CSV", file_name, format!("unreadable header row: {err}")))?
        .iter()
        .map(|header| header.to_string())
        .collect();
    if headers.iter().all(|header| header.is_empty()) {
        return Err(ParseError::corrupt("CSV", file_name, "missing header row"));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            ParseError::corrupt("CSV", file_name, format!("row {}: {err}", index + 2))
        })?;
        let row = RowMap::from_cells(&headers, record.iter().map(str::to_string));
        if !row.is_blank() {
            rows.push(row);
        }
    }

    debug!(file = file_name, columns = headers.len(), rows = rows.len(), "csv rows read");
    Ok(rows)
}

fn decode<'a>(file_name: &str, bytes: &'a [u8]) -> Cow<'a, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!(file = file_name, "csv is not valid UTF-8, replacing invalid sequences");
            String::from_utf8_lossy(bytes)
        }
    }
}
