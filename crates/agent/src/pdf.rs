//! PDF text extraction via `lopdf`.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object};
use slotflow_core::document::METADATA_KEYS;
use slotflow_core::error::IngestError;
use tracing::{debug, warn};

use crate::ingest::{ExtractedText, TextExtractor};

/// Extracts page text and the Info dictionary from a PDF file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, IngestError> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let doc = Document::load_mem(&bytes).map_err(|e| IngestError::Extraction {
            path: path.to_path_buf(),
            reason: format!("not a readable PDF: {e}"),
        })?;

        let pages: Vec<String> = doc
            .get_pages()
            .keys()
            .map(|&number| match doc.extract_text(&[number]) {
                Ok(text) => text,
                Err(e) => {
                    warn!(page = number, error = %e, "Could not extract page text");
                    String::new()
                }
            })
            .collect();

        let metadata = info_dictionary(&doc)
            .map(|info| read_metadata(&doc, info))
            .unwrap_or_default();

        debug!(path = %path.display(), pages = pages.len(), "PDF parsed");
        Ok(ExtractedText { pages, metadata })
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn read_metadata(doc: &Document, info: &Dictionary) -> BTreeMap<String, String> {
    METADATA_KEYS
        .iter()
        .filter_map(|key| {
            let pdf_key = capitalize(key);
            let object = match info.get(pdf_key.as_bytes()).ok()? {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            match object {
                Object::String(bytes, _) => Some(((*key).to_string(), decode_pdf_string(bytes))),
                _ => None,
            }
        })
        .collect()
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, else UTF-8,
/// else one byte per character.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
