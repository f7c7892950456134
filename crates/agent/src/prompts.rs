//! Prompt templates and fixed reply texts.
//!
//! Templates use `{name}` placeholders that [`Prompt`](slotflow_core::Prompt)
//! fills at render time.

use std::path::Path;

use slotflow_core::document::DocumentRecord;
use slotflow_core::error::IngestError;
use slotflow_core::ledger::{CollectionLedger, LedgerEntry};
use slotflow_core::schema::SchemaRegistry;

/// Shown in place of an empty history.
pub const NO_HISTORY: &str = "No previous conversation";

/// Shown to a collector that has nothing yet.
pub const NOTHING_COLLECTED: &str = "Nothing collected yet";

/// The summarizer's empty-ledger marker.
pub const NO_DATA_COLLECTED: &str = "No data has been collected yet.";

pub const ROUTER_SYSTEM: &str = "\
You are the intent router of a data collection assistant. Decide which handler \
should take the user's current message.

Routing rules:
{rules}

Current collection progress:
{progress}

Use the recent conversation to resolve follow-ups: a bare value usually answers \
the question the assistant asked last. Report how confident you are as a number \
between 0 and 1 and explain your choice in one sentence.";

pub const ROUTER_HUMAN: &str = "\
Recent conversation:
{history}

Current message: {input}";

pub const COLLECTOR_SYSTEM: &str = "\
You are the {collector} collector of a data collection assistant. {description}
You need these fields from the user: {required}.

Already collected:
{known}

Still missing: {missing}
Field to ask for next: {next_field}
Status: {status}

Acknowledge any values the user just gave, then ask for the next missing field. \
If nothing is missing, confirm the collected values and tell the user this part \
is complete. Keep the reply short and friendly.";

pub const COLLECTOR_HUMAN: &str = "\
Conversation so far:
{history}

User: {input}";

pub const EXTRACT_SYSTEM: &str = "\
Extract values for the fields {fields} from the user's latest message. \
Only report values the user actually states for these exact fields. \
Use null for every field that is not mentioned.";

pub const EXTRACT_HUMAN: &str = "\
Conversation so far:
{history}

Latest message: {input}";

pub const SUMMARY_SYSTEM: &str = "\
You summarize what a data collection assistant has gathered. Describe every \
collected group and document in plain language. Do not invent values. If \
nothing has been collected, say so and list what the user could provide.";

pub const SUMMARY_HUMAN: &str = "\
Collected data:
{digest}

Recent conversation:
{history}

Write the summary.";

/// Compact per-slot progress for the router.
pub fn progress_digest(ledger: &CollectionLedger, registry: &SchemaRegistry) -> String {
    if ledger.is_empty() {
        return NOTHING_COLLECTED.to_string();
    }
    ledger
        .iter()
        .map(|(id, entry)| match entry {
            LedgerEntry::Fields(fields) => {
                let have: Vec<&str> = fields.values.keys().map(String::as_str).collect();
                let missing = registry
                    .lookup(id)
                    .map(|spec| fields.missing(spec).join(", "))
                    .unwrap_or_default();
                if fields.complete {
                    format!("- {id}: complete ({})", have.join(", "))
                } else {
                    format!(
                        "- {id}: in progress (have: {}; missing: {missing})",
                        if have.is_empty() { "none".to_string() } else { have.join(", ") }
                    )
                }
            }
            LedgerEntry::Document(doc) => match &doc.record {
                Some(record) => format!("- {id}: loaded {}", record.filename),
                None => format!("- {id}: no document loaded"),
            },
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reply used when no handler applies.
pub fn fallback_reply(registry: &SchemaRegistry) -> String {
    let groups: Vec<String> = registry
        .groups()
        .map(|g| format!("{} ({})", g.name, g.required_fields.join(", ")))
        .collect();
    format!(
        "I'm not sure what you'd like to do. I can collect {}, load a PDF document, \
         or summarize what has been collected so far.",
        groups.join("; ")
    )
}

pub fn document_loaded(record: &DocumentRecord) -> String {
    format!(
        "PDF loaded successfully: {} ({} pages). Extracted {} characters of text.",
        record.filename,
        record.page_count,
        record.char_count()
    )
}

pub fn document_request(base_dir: &Path) -> String {
    format!(
        "Please provide the path to the PDF file you'd like me to process. \
         I'll look in {} or you can provide an absolute path.",
        base_dir.display()
    )
}

pub fn document_failed(error: &IngestError, base_dir: &Path) -> String {
    format!(
        "I couldn't load that document: {error}. Please provide a valid path to a PDF file, \
         either relative to {} or absolute.",
        base_dir.display()
    )
}
