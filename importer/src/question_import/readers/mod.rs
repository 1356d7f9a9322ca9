// Source readers: uploaded bytes become rows (CSV/XLSX) or text (PDF)

pub mod delimited;
pub mod pdf;
pub mod workbook;

use sha2::{Digest, Sha256};

pub use pdf::{PdfReader, PdfText};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No text could be extracted from {file_name}")]
    NoTextExtracted { file_name: String },
    #[error("Could not read {format} file {file_name}: {detail}")]
    Corrupt {
        format: &'static str,
        file_name: String,
        detail: String,
    },
}

impl ParseError {
    pub fn corrupt(
        format: &'static str,
        file_name: impl Into<String>,
        detail: impl std::fmt::Display,
    ) -> Self {
        ParseError::Corrupt {
            format,
            file_name: file_name.into(),
            detail: detail.to_string(),
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            ParseError::NoTextExtracted { .. } => {
                "The PDF looks scanned or image-only; run it through OCR and upload the result"
            }
            ParseError::Corrupt { .. } => {
                "Check that the file opens correctly and re-export it before uploading again"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Csv,
    Workbook,
}

impl SourceFormat {
    /// Detects the format from the MIME type, falling back to the file extension when
    /// the client sent a generic type.
    pub fn detect(mime_type: &str, file_name: &str) -> Option<Self> {
        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let by_mime = match mime.as_str() {
            "application/pdf" => Some(SourceFormat::Pdf),
            "text/csv" | "application/csv" | "text/comma-separated-values" => {
                Some(SourceFormat::Csv)
            }
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(SourceFormat::Workbook),
            _ => None,
        };
        by_mime.or_else(|| Self::from_extension(file_name))
    }

    fn from_extension(file_name: &str) -> Option<Self> {
        let extension = std::path::Path::new(file_name)
            .extension()?
            .to_str()?
            .to_lowercase();
        match extension.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(SourceFormat::Workbook),
            _ => None,
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, SourceFormat::Csv | SourceFormat::Workbook)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "PDF",
            SourceFormat::Csv => "CSV",
            SourceFormat::Workbook => "spreadsheet",
        }
    }
}

/// An uploaded file as received at the boundary.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> Option<SourceFormat> {
        SourceFormat::detect(&self.mime_type, &self.file_name)
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// File name without its extension, used for default batch names.
    pub fn file_stem(&self) -> String {
        std::path::Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.trim().is_empty())
            .unwrap_or("import")
            .to_string()
    }
}

/// One spreadsheet data row keyed by header name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMap {
    cells: Vec<(String, String)>,
}

impl RowMap {
    pub fn from_cells(headers: &[String], values: impl IntoIterator<Item = String>) -> Self {
        let cells = headers
            .iter()
            .cloned()
            .zip(values)
            .filter(|(header, _)| !header.is_empty())
            .collect();
        Self { cells }
    }

    /// First non-empty value whose header matches one of `aliases`, ignoring case and
    /// surrounding whitespace.
    pub fn get<S: AsRef<str>>(&self, aliases: &[S]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            let alias = alias.as_ref().trim().to_lowercase();
            self.cells
                .iter()
                .filter(|(header, _)| header.trim().to_lowercase() == alias)
                .map(|(_, value)| value.trim())
                .find(|value| !value.is_empty())
        })
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum SourceContent {
    Rows(Vec<RowMap>),
    Text(PdfText),
}

/// Reads an uploaded file into rows or text according to its detected format.
pub fn read_source(file: &UploadedFile, format: SourceFormat) -> Result<SourceContent, ParseError> {
    match format {
        SourceFormat::Pdf => PdfReader::read(&file.file_name, &file.bytes).map(SourceContent::Text),
        SourceFormat::Csv => {
            delimited::read_rows(&file.file_name, &file.bytes).map(SourceContent::Rows)
        }
        SourceFormat::Workbook => {
            workbook::read_rows(&file.file_name, &file.bytes).map(SourceContent::Rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_by_mime_then_extension() {
        assert_eq!(
            SourceFormat::detect("application/pdf", "paper.bin"),
            Some(SourceFormat::Pdf)
        );
        assert_eq!(
            SourceFormat::detect("text/csv; charset=utf-8", "q"),
            Some(SourceFormat::Csv)
        );
        assert_eq!(
            SourceFormat::detect("application/octet-stream", "Questions.XLSX"),
            Some(SourceFormat::Workbook)
        );
        assert_eq!(SourceFormat::detect("application/octet-stream", "notes.txt"), None);
    }

    #[test]
    fn row_lookup_is_case_insensitive_and_skips_empty_values() {
        let headers = vec!["Question".to_string(), "OPTION A".to_string(), "Marks".to_string()];
        let row = RowMap::from_cells(
            &headers,
            vec!["What is 2+2?".to_string(), " 4 ".to_string(), "".to_string()],
        );

        assert_eq!(row.get(&["question"]), Some("What is 2+2?"));
        assert_eq!(row.get(&["Option 1", "option a"]), Some("4"));
        assert_eq!(row.get(&["marks"]), None);
        assert_eq!(row.get(&["missing"]), None);
    }

    #[test]
    fn file_stem_falls_back_for_nameless_uploads() {
        let file = UploadedFile::new("Set 1.pdf", "application/pdf", vec![1]);
        assert_eq!(file.file_stem(), "Set 1");
        let nameless = UploadedFile::new("", "application/pdf", vec![1]);
        assert_eq!(nameless.file_stem(), "import");
    }
}
