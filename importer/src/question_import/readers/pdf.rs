// PDF text reader

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::ParseError;

static PAGE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s*\d+(?:\s*(?:of|/)\s*\d+)?|-\s*\d+\s*-|\d+\s*/\s*\d+)$")
        .expect("page marker regex")
});

static INLINE_SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{a0}]{2,}").expect("inline space regex"));

/// Text of every page, concatenated in page order.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
}

pub struct PdfReader;

impl PdfReader {
    pub fn read(file_name: &str, bytes: &[u8]) -> Result<PdfText, ParseError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(ParseError::corrupt("PDF", file_name, "missing %PDF header"));
        }

        // pdf-extract panics on some malformed content streams.
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
        let raw = match extracted {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return Err(ParseError::corrupt("PDF", file_name, err)),
            Err(_) => {
                warn!(file = file_name, "pdf parser aborted on malformed content");
                return Err(ParseError::corrupt(
                    "PDF",
                    file_name,
                    "the parser aborted on malformed content",
                ));
            }
        };

        let page_count = raw.matches('\u{c}').count().max(1);
        let text = Self::clean_text(&raw);
        if !has_meaningful_text(&text) {
            return Err(ParseError::NoTextExtracted {
                file_name: file_name.to_string(),
            });
        }

        debug!(
            file = file_name,
            pages = page_count,
            chars = text.chars().count(),
            "pdf text extracted"
        );
        Ok(PdfText { text, page_count })
    }

    /// Trims lines, drops blank lines and page furniture, and collapses runs of spaces.
    pub fn clean_text(text: &str) -> String {
        text.replace('\0', "")
            .replace("\r\n", "\n")
            .split(['\n', '\r', '\u{c}'])
            .map(|line| INLINE_SPACES.replace_all(line.trim(), " ").into_owned())
            .filter(|line| !line.is_empty() && !PAGE_MARKER.is_match(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn has_meaningful_text(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
