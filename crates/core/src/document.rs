//! Document records produced by ingestion.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata keys kept from a document, in display order.
pub const METADATA_KEYS: [&str; 4] = ["title", "author", "subject", "creator"];

/// The content of one successfully ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub raw_text: String,
    /// Always holds exactly the [`METADATA_KEYS`], empty when absent.
    pub metadata: BTreeMap<String, String>,
    pub page_count: usize,
    pub source_path: PathBuf,
}

impl DocumentRecord {
    pub fn new(
        source_path: PathBuf,
        raw_text: String,
        page_count: usize,
        found_metadata: &BTreeMap<String, String>,
    ) -> Self {
        let filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());

        let metadata = METADATA_KEYS
            .iter()
            .map(|key| {
                let value = found_metadata.get(*key).cloned().unwrap_or_default();
                ((*key).to_string(), value)
            })
            .collect();

        Self {
            filename,
            raw_text,
            metadata,
            page_count,
            source_path,
        }
    }

    /// Character count of the extracted text.
    pub fn char_count(&self) -> usize {
        self.raw_text.chars().count()
    }

    /// The first `max_chars` characters of the text.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        match self.raw_text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.raw_text[..idx],
            None => &self.raw_text,
        }
    }
}
