// Workbook reader (XLSX, XLS, ODS). Only the first worksheet is read.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::debug;

use super::{ParseError, RowMap};

pub fn read_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<RowMap>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| ParseError::corrupt("spreadsheet", file_name, err))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::corrupt("spreadsheet", file_name, "workbook has no worksheets"))?
        .map_err(|err| ParseError::corrupt("spreadsheet", file_name, err))?;

    let rows = rows_from_range(&range);
    debug!(file = file_name, rows = rows.len(), "worksheet rows read");
    Ok(rows)
}

/// First row is the header; every later non-blank row becomes a `RowMap`.
pub fn rows_from_range(range: &Range<Data>) -> Vec<RowMap> {
    let mut iter = range.rows();
    let headers: Vec<String> = match iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect(),
        None => return Vec::new(),
    };

    iter.map(|row| RowMap::from_cells(&headers, row.iter().map(cell_to_string)))
        .filter(|row| !row.is_blank())
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
