//! Document ingestion: finding a file reference in the user's message,
//! resolving it, and extracting its text into a [`DocumentRecord`].
//!
//! Text extraction is blocking library work and runs on tokio's blocking
//! pool through the [`TextExtractor`] trait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotflow_core::document::DocumentRecord;
use slotflow_core::error::IngestError;
use slotflow_core::ledger::DocumentEntry;
use tracing::{info, warn};

use crate::pdf::LopdfExtractor;
use crate::prompts;

/// Raw output of a text extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    /// One string per page, in page order.
    pub pages: Vec<String>,
    /// Whatever document-info entries were found, keyed by lowercase name.
    pub metadata: BTreeMap<String, String>,
}

/// Blocking text extraction from a file on disk.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedText, IngestError>;
}

/// What the ingestor did with a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// No reference in the input; the user was asked for one.
    Requested,
    Loaded { filename: String, page_count: usize },
    Failed(String),
}

/// Result of one document-handler visit.
#[derive(Debug, Clone)]
pub struct IngestStep {
    pub reply: String,
    pub entry: DocumentEntry,
    pub outcome: IngestOutcome,
}

pub struct DocumentIngestor {
    base_dir: PathBuf,
    extension: String,
    extractor: Arc<dyn TextExtractor>,
}

impl DocumentIngestor {
    pub fn new(base_dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            extractor: Arc::new(LopdfExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// First whitespace-delimited token that names a file with our extension.
    pub fn detect_reference(&self, input: &str) -> Option<String> {
        input
            .split_whitespace()
            .map(clean_token)
            .find(|token| has_extension(token, &self.extension))
            .map(str::to_string)
    }

    /// The reference as given if it is a file, else relative to the base dir.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, IngestError> {
        let direct = PathBuf::from(reference);
        if direct.is_file() {
            return Ok(direct);
        }
        let in_base = self.base_dir.join(reference);
        if in_base.is_file() {
            return Ok(in_base);
        }
        Err(IngestError::NotFound {
            reference: reference.to_string(),
            base_dir: self.base_dir.clone(),
        })
    }

    /// Resolve and extract a document.
    pub async fn ingest(&self, reference: &str) -> Result<DocumentRecord, IngestError> {
        let path = self.resolve(reference)?;
        let extractor = Arc::clone(&self.extractor);
        let job_path = path.clone();

        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&job_path))
            .await
            .map_err(|e| IngestError::Extraction {
                path: path.clone(),
                reason: format!("extraction task failed: {e}"),
            })??;

        let page_count = extracted.pages.len();
        let record = DocumentRecord::new(
            path,
            extracted.pages.join("\n"),
            page_count,
            &extracted.metadata,
        );
        info!(
            filename = %record.filename,
            pages = record.page_count,
            chars = record.char_count(),
            "Document ingested"
        );
        Ok(record)
    }

    /// Handle a turn routed to the document slot.
    ///
    /// Without a reference the existing entry is kept (or a pending one is
    /// created) and the user is asked for a path.
    pub async fn handle(&self, input: &str, entry: Option<&DocumentEntry>) -> IngestStep {
        let Some(reference) = self.detect_reference(input) else {
            return IngestStep {
                reply: prompts::document_request(&self.base_dir),
                entry: entry.cloned().unwrap_or_else(DocumentEntry::pending),
                outcome: IngestOutcome::Requested,
            };
        };

        match self.ingest(&reference).await {
            Ok(record) => IngestStep {
                reply: prompts::document_loaded(&record),
                outcome: IngestOutcome::Loaded {
                    filename: record.filename.clone(),
                    page_count: record.page_count,
                },
                entry: DocumentEntry::loaded(record),
            },
            Err(e) => {
                warn!(reference = %reference, error = %e, "Document ingestion failed");
                IngestStep {
                    reply: prompts::document_failed(&e, &self.base_dir),
                    entry: DocumentEntry::failed(e.to_string()),
                    outcome: IngestOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}

fn is_wrapper(c: char) -> bool {
    matches!(c, '"' | '\'' | '`' | '(' | ')' | '[' | ']' | '<' | '>')
}

fn is_trailing_punct(c: char) -> bool {
    matches!(c, ',' | ';' | ':' | '!' | '?' | '.')
}

/// Strip quotes, brackets and trailing punctuation until stable.
fn clean_token(token: &str) -> &str {
    let mut current = token;
    loop {
        let next = current
            .trim_matches(is_wrapper)
            .trim_end_matches(is_trailing_punct);
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

fn has_extension(token: &str, extension: &str) -> bool {
    let path = Path::new(token);
    let stem_ok = path.file_stem().is_some_and(|s| !s.is_empty());
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    stem_ok && ext_ok
}
