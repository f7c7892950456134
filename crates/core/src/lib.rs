//! # Slotflow Core
//!
//! Domain types, traits, and error definitions for Slotflow, a multi-turn
//! slot-filling assistant. This crate has **no I/O**. It defines the domain
//! model that the provider, agent and CLI crates implement against.
//!
//! ## Design Philosophy
//!
//! External capabilities (LLM providers, the text completion port) are traits
//! here; implementations live in their own crates. State that a turn mutates
//! (ledger, history, routing decision) lives in [`ConversationSession`] and is
//! keyed by the closed [`CollectorId`] enumeration.

pub mod completion;
pub mod document;
pub mod error;
pub mod event;
pub mod ledger;
pub mod provider;
pub mod schema;
pub mod session;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use completion::{CompletionPort, Prompt};
pub use document::DocumentRecord;
pub use error::{
    CompletionError, Error, ExtractionError, IngestError, ProviderError, Result, RoutingError,
    SchemaError,
};
pub use event::{ConversationEvent, EventBus};
pub use ledger::{
    CollectionLedger, CollectorState, DocumentEntry, FieldEntry, FieldValue, LedgerEntry,
    MergeReport,
};
pub use provider::{ChatMessage, ChatRole, Provider, ProviderRequest, ProviderResponse, Usage};
pub use schema::{CollectorId, CollectorKind, FieldGroupSpec, SchemaRegistry};
pub use session::{ConversationSession, RoutingDecision, SessionId, SessionSnapshot, TurnScratch};
pub use turn::{Role, Turn};
