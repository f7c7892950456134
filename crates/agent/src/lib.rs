//! The conversation engine for Slotflow.
//!
//! Each user turn flows through the **route → handle → commit** pipeline:
//!
//! 1. **Route**: the [`IntentRouter`] classifies the input into a collector,
//!    the document slot, the summary, or nothing
//! 2. **Handle**: a field collector extracts and merges values, the
//!    [`DocumentIngestor`] loads a PDF, or the [`Summarizer`] narrates the ledger
//! 3. **Commit**: the [`Orchestrator`] swaps in the updated session and
//!    publishes conversation events
//!
//! All natural-language work goes through a
//! [`CompletionPort`](slotflow_core::CompletionPort) passed in by the caller.

pub mod collector;
pub mod extraction;
pub mod ingest;
pub mod orchestrator;
pub mod pdf;
pub mod prompts;
pub mod router;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use collector::{CollectorMachine, CollectorStep};
pub use extraction::{
    CompletionExtractor, FieldExtractor, HybridExtractor, PatternExtractor, extractor_for,
};
pub use ingest::{DocumentIngestor, ExtractedText, IngestOutcome, IngestStep, TextExtractor};
pub use orchestrator::{Orchestrator, TurnError, TurnOutcome};
pub use pdf::LopdfExtractor;
pub use router::{IntentRouter, RouteError};
pub use summarizer::Summarizer;
