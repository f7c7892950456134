//! Collector state machine for field groups.
//!
//! `NEW` (no entry) → `PARTIAL` → `COMPLETE`. Each visit extracts values
//! from the current input, merges them into a working copy of the entry and
//! asks the completion port for the conversational reply.

use std::sync::Arc;

use slotflow_core::completion::{CompletionPort, Prompt};
use slotflow_core::error::CompletionError;
use slotflow_core::ledger::{FieldEntry, MergeReport};
use slotflow_core::schema::FieldGroupSpec;
use slotflow_core::turn::{Turn, format_history};
use tracing::{debug, info, warn};

use crate::extraction::FieldExtractor;
use crate::prompts;

/// Result of one collector visit.
#[derive(Debug, Clone)]
pub struct CollectorStep {
    pub reply: String,
    pub entry: FieldEntry,
    pub report: MergeReport,
}

/// Drives one field group through a turn.
pub struct CollectorMachine {
    port: Arc<dyn CompletionPort>,
    extractor: Arc<dyn FieldExtractor>,
    history_window: usize,
}

impl CollectorMachine {
    pub fn new(port: Arc<dyn CompletionPort>, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self {
            port,
            extractor,
            history_window: 10,
        }
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    /// Run one visit. `entry` is left untouched; the updated copy is returned.
    pub async fn advance(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
        history: &[Turn],
        entry: Option<&FieldEntry>,
    ) -> Result<CollectorStep, CompletionError> {
        let mut working = entry.cloned().unwrap_or_default();

        let report = if working.complete {
            debug!(collector = %spec.name, "Collector already complete, re-confirming");
            MergeReport::default()
        } else {
            let pairs = match self.extractor.extract(spec, input, history).await {
                Ok(pairs) => pairs,
                Err(e) => {
                    warn!(collector = %spec.name, error = %e, "Field extraction failed");
                    Vec::new()
                }
            };
            let report = working.merge(spec, &pairs);
            if !report.rejected.is_empty() {
                debug!(collector = %spec.name, rejected = ?report.rejected, "Dropped extracted pairs");
            }
            report
        };

        if report.completed {
            info!(collector = %spec.name, "Collector complete");
        }

        let prompt = self.build_prompt(spec, input, history, &working);
        let reply = self.port.generate(&prompt).await?;

        Ok(CollectorStep {
            reply,
            entry: working,
            report,
        })
    }

    fn build_prompt(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
        history: &[Turn],
        entry: &FieldEntry,
    ) -> Prompt {
        let start = history.len().saturating_sub(self.history_window);
        let missing = entry.missing(spec);

        let known = if entry.values.is_empty() {
            prompts::NOTHING_COLLECTED.to_string()
        } else {
            entry
                .values
                .iter()
                .map(|(field, value)| format!("- {field}: {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Prompt::new(prompts::COLLECTOR_SYSTEM, prompts::COLLECTOR_HUMAN)
            .var("collector", spec.name.as_str())
            .var("description", spec.description.as_str())
            .var("required", spec.required_fields.join(", "))
            .var("known", known)
            .var(
                "missing",
                if missing.is_empty() { "none".to_string() } else { missing.join(", ") },
            )
            .var("next_field", missing.first().copied().unwrap_or("none"))
            .var("status", if entry.complete { "complete" } else { "in progress" })
            .var("history", format_history(&history[start..], prompts::NO_HISTORY))
            .var("input", input)
    }
}
