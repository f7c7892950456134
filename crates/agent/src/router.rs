//! Intent router: decides which handler owns the current turn.
//!
//! The router asks the completion port for a structured classification
//! `{intent, confidence, reasoning}` and validates it strictly. Anything
//! outside the known targets is rejected rather than guessed.

use std::sync::Arc;

use serde_json::{Value, json};
use slotflow_core::completion::{CompletionPort, Prompt};
use slotflow_core::error::{CompletionError, RoutingError};
use slotflow_core::ledger::CollectionLedger;
use slotflow_core::schema::{CollectorId, SchemaRegistry};
use slotflow_core::session::RoutingDecision;
use slotflow_core::turn::{Turn, format_history};
use tracing::{debug, info};

use crate::prompts;

/// Why routing produced no decision.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The classification came back but is not acceptable.
    #[error(transparent)]
    Rejected(#[from] RoutingError),

    /// The completion service could not be reached.
    #[error(transparent)]
    Completion(CompletionError),
}

impl From<CompletionError> for RouteError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Parse { reason, .. } => {
                RouteError::Rejected(RoutingError::Unparsable(reason))
            }
            other => RouteError::Completion(other),
        }
    }
}

/// Turns free text into a [`RoutingDecision`].
pub struct IntentRouter {
    port: Arc<dyn CompletionPort>,
    registry: Arc<SchemaRegistry>,
    history_window: usize,
}

impl IntentRouter {
    pub fn new(port: Arc<dyn CompletionPort>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            port,
            registry,
            history_window: 5,
        }
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    /// JSON schema of the classification the port must return.
    pub fn output_schema() -> Value {
        let mut intents: Vec<&str> = CollectorId::ALL.iter().map(|id| id.as_str()).collect();
        intents.push("none");
        json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string", "enum": intents},
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                "reasoning": {"type": "string"}
            },
            "required": ["intent", "confidence", "reasoning"]
        })
    }

    /// Build the classification prompt. `history` excludes the current input.
    pub fn build_prompt(&self, input: &str, history: &[Turn], ledger: &CollectionLedger) -> Prompt {
        let start = history.len().saturating_sub(self.history_window);
        Prompt::new(prompts::ROUTER_SYSTEM, prompts::ROUTER_HUMAN)
            .var("rules", self.registry.routing_rules())
            .var("progress", prompts::progress_digest(ledger, &self.registry))
            .var("history", format_history(&history[start..], prompts::NO_HISTORY))
            .var("input", input)
    }

    /// Classify the current input.
    pub async fn route(
        &self,
        input: &str,
        history: &[Turn],
        ledger: &CollectionLedger,
    ) -> Result<RoutingDecision, RouteError> {
        let prompt = self.build_prompt(input, history, ledger);
        debug!(input, "Routing turn");

        let raw = self.port.classify(&prompt, &Self::output_schema()).await?;
        let decision = parse_decision(&raw)?;

        info!(
            collector = decision.target_name(),
            confidence = decision.confidence,
            "Routing decision"
        );
        Ok(decision)
    }
}

/// Validate a raw classification.
pub fn parse_decision(raw: &Value) -> Result<RoutingDecision, RoutingError> {
    let intent = raw
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| RoutingError::Malformed("intent".into()))?;

    let confidence = raw
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| RoutingError::Malformed("confidence".into()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(RoutingError::InvalidConfidence(confidence));
    }

    let rationale = raw
        .get("reasoning")
        .and_then(Value::as_str)
        .ok_or_else(|| RoutingError::Malformed("reasoning".into()))?;

    // Exact match against the schema enum; no case folding or trimming
    let target = if intent == "none" {
        None
    } else {
        let id = CollectorId::ALL
            .into_iter()
            .find(|id| id.as_str() == intent)
            .ok_or_else(|| RoutingError::InvalidTarget(intent.to_string()))?;
        Some(id)
    };

    Ok(RoutingDecision {
        target,
        confidence,
        rationale: rationale.trim().to_string(),
    })
}
