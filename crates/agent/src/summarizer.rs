//! Summarizer: narrates everything collected so far. Never mutates the ledger.

use std::sync::Arc;

use slotflow_core::completion::{CompletionPort, Prompt};
use slotflow_core::error::CompletionError;
use slotflow_core::ledger::{CollectionLedger, LedgerEntry};
use slotflow_core::turn::{Turn, format_history};
use tracing::debug;

use crate::prompts;

pub struct Summarizer {
    port: Arc<dyn CompletionPort>,
    history_window: usize,
    excerpt_chars: usize,
}

impl Summarizer {
    pub fn new(port: Arc<dyn CompletionPort>) -> Self {
        Self {
            port,
            history_window: 20,
            excerpt_chars: 2000,
        }
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    /// Digest of every complete entry, or `None` when nothing is complete.
    pub fn digest(&self, ledger: &CollectionLedger) -> Option<String> {
        let sections: Vec<String> = ledger
            .completed()
            .map(|(id, entry)| match entry {
                LedgerEntry::Fields(fields) => {
                    let mut lines = vec![format!("[{id}]")];
                    lines.extend(fields.values.iter().map(|(f, v)| format!("{f}: {v}")));
                    lines.join("\n")
                }
                LedgerEntry::Document(doc) => {
                    let mut lines = vec![format!("[{id}]")];
                    if let Some(record) = &doc.record {
                        lines.push(format!("filename: {}", record.filename));
                        lines.push(format!("pages: {}", record.page_count));
                        for (key, value) in &record.metadata {
                            if !value.is_empty() {
                                lines.push(format!("{key}: {value}"));
                            }
                        }
                        lines.push(format!(
                            "text excerpt:\n{}",
                            record.excerpt(self.excerpt_chars)
                        ));
                    }
                    lines.join("\n")
                }
            })
            .collect();

        (!sections.is_empty()).then(|| sections.join("\n\n"))
    }

    /// Produce the `Summary:` reply.
    pub async fn summarize(
        &self,
        ledger: &CollectionLedger,
        history: &[Turn],
    ) -> Result<String, CompletionError> {
        let digest = self.digest(ledger);
        let start = history.len().saturating_sub(self.history_window);

        let prompt = Prompt::new(prompts::SUMMARY_SYSTEM, prompts::SUMMARY_HUMAN)
            .var(
                "digest",
                digest.as_deref().unwrap_or(prompts::NO_DATA_COLLECTED),
            )
            .var("history", format_history(&history[start..], prompts::NO_HISTORY));

        debug!(entries = ledger.completed().count(), "Summarizing ledger");
        let narration = self.port.generate(&prompt).await?;

        Ok(match digest {
            Some(_) => format!("Summary:\n{narration}"),
            None => format!("Summary:\n{}\n{narration}", prompts::NO_DATA_COLLECTED),
        })
    }
}
