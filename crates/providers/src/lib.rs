//! LLM provider implementations for Slotflow.
//!
//! All providers implement the `slotflow_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! [`ProviderCompletionPort`] turns any provider into a completion port.

pub mod completion;
pub mod openai_compat;
pub mod router;

pub use completion::ProviderCompletionPort;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
