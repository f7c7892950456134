//! Collection ledger: what each collector has gathered so far.
//!
//! One entry per collector, keyed by [`CollectorId`]. Field-group collectors
//! hold a [`FieldEntry`]; the document collector holds a [`DocumentEntry`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::DocumentRecord;
use crate::schema::{CollectorId, FieldGroupSpec};

/// A `(field, value)` pair produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field: String,
    pub value: String,
}

impl FieldValue {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Progress of a field-group collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    /// No ledger entry yet.
    New,
    /// Entry exists, some required fields are missing.
    Partial,
    /// Every required field is present. Terminal.
    Complete,
}

impl CollectorState {
    pub fn of(entry: Option<&FieldEntry>) -> Self {
        match entry {
            None => CollectorState::New,
            Some(e) if e.complete => CollectorState::Complete,
            Some(_) => CollectorState::Partial,
        }
    }
}

/// Values gathered by one field-group collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub values: BTreeMap<String, String>,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Fields whose value was set or changed, in merge order.
    pub updated: Vec<String>,
    /// Pairs dropped because the field is not in the group or the value is blank.
    pub rejected: Vec<String>,
    /// The entry went from incomplete to complete during this merge.
    pub completed: bool,
}

impl FieldEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge extracted pairs.
    ///
    /// Only fields required by `spec` are accepted and blank values are
    /// ignored. Later pairs win over earlier ones. Existing values are never
    /// cleared. A complete entry is frozen and the merge is a no-op.
    pub fn merge(&mut self, spec: &FieldGroupSpec, pairs: &[FieldValue]) -> MergeReport {
        let mut report = MergeReport::default();
        if self.complete {
            return report;
        }

        for pair in pairs {
            let value = pair.value.trim();
            if value.is_empty() || !spec.requires(&pair.field) {
                report.rejected.push(pair.field.clone());
                continue;
            }
            let changed = self.values.get(&pair.field).map(String::as_str) != Some(value);
            if changed {
                self.values.insert(pair.field.clone(), value.to_string());
                report.updated.retain(|f| f != &pair.field);
                report.updated.push(pair.field.clone());
            }
        }

        report.completed = self.refresh_completion(spec);
        report
    }

    /// Recompute `complete`. Returns true when the entry just became complete.
    /// Never downgrades a complete entry.
    pub fn refresh_completion(&mut self, spec: &FieldGroupSpec) -> bool {
        if self.complete {
            return false;
        }
        self.complete = spec.is_satisfied_by(&self.values);
        if self.complete {
            self.error = None;
        }
        self.complete
    }

    pub fn missing<'a>(&self, spec: &'a FieldGroupSpec) -> Vec<&'a str> {
        spec.missing(&self.values)
    }
}

/// State of the document slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<DocumentRecord>,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentEntry {
    /// Entry created when the slot is first visited without a document.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn loaded(record: DocumentRecord) -> Self {
        Self {
            record: Some(record),
            complete: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            record: None,
            complete: false,
            error: Some(message.into()),
        }
    }
}

/// One ledger slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Fields(FieldEntry),
    Document(DocumentEntry),
}

impl LedgerEntry {
    pub fn is_complete(&self) -> bool {
        match self {
            LedgerEntry::Fields(e) => e.complete,
            LedgerEntry::Document(e) => e.complete,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LedgerEntry::Fields(e) => e.error.as_deref(),
            LedgerEntry::Document(e) => e.error.as_deref(),
        }
    }

    /// Number of populated values, for status displays.
    pub fn value_count(&self) -> usize {
        match self {
            LedgerEntry::Fields(e) => e.values.len(),
            LedgerEntry::Document(e) => usize::from(e.record.is_some()),
        }
    }
}

/// Per-session map of collector id → ledger entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionLedger {
    entries: BTreeMap<CollectorId, LedgerEntry>,
}

impl CollectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: CollectorId) -> Option<&LedgerEntry> {
        self.entries.get(&id)
    }

    pub fn fields(&self, id: CollectorId) -> Option<&FieldEntry> {
        match self.entries.get(&id) {
            Some(LedgerEntry::Fields(e)) => Some(e),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&DocumentEntry> {
        match self.entries.get(&CollectorId::Document) {
            Some(LedgerEntry::Document(e)) => Some(e),
            _ => None,
        }
    }

    pub fn put_fields(&mut self, id: CollectorId, entry: FieldEntry) {
        self.entries.insert(id, LedgerEntry::Fields(entry));
    }

    pub fn put_document(&mut self, entry: DocumentEntry) {
        self.entries
            .insert(CollectorId::Document, LedgerEntry::Document(entry));
    }

    pub fn iter(&self) -> impl Iterator<Item = (CollectorId, &LedgerEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Progress of any slot; a pending or failed document counts as partial.
    pub fn state(&self, id: CollectorId) -> CollectorState {
        match self.entries.get(&id) {
            None => CollectorState::New,
            Some(e) if e.is_complete() => CollectorState::Complete,
            Some(_) => CollectorState::Partial,
        }
    }

    /// Entries marked complete, in id order.
    pub fn completed(&self) -> impl Iterator<Item = (CollectorId, &LedgerEntry)> {
        self.iter().filter(|(_, e)| e.is_complete())
    }
}
