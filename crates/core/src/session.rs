//! Conversation session: the aggregate one orchestrator call mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::CollectionLedger;
use crate::schema::CollectorId;
use crate::turn::Turn;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The router's verdict for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// `None` when no handler applies.
    pub target: Option<CollectorId>,
    pub confidence: f64,
    pub rationale: String,
}

impl RoutingDecision {
    pub fn target_name(&self) -> &'static str {
        self.target.map(|t| t.as_str()).unwrap_or("none")
    }

    /// The router-role note appended to history.
    pub fn to_turn(&self) -> Turn {
        Turn::router(format!(
            "Routing to {} (confidence: {:.2}). {}",
            self.target_name(),
            self.confidence,
            self.rationale
        ))
    }
}

/// Ephemeral per-turn data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnScratch {
    /// Raw input of the turn being (or last) processed.
    pub user_input: String,
    /// Handler that produced the last reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_by: Option<CollectorId>,
    /// Why the last turn was not routed, if it was not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_error: Option<String>,
}

/// All state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,
    turns: Vec<Turn>,
    pub ledger: CollectionLedger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<RoutingDecision>,
    #[serde(default)]
    pub scratch: TurnScratch,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serializable view handed back to callers after each turn.
pub type SessionSnapshot = ConversationSession;

impl ConversationSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            turns: Vec::new(),
            ledger: CollectionLedger::new(),
            last_decision: None,
            scratch: TurnScratch::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn. History is never reordered or edited.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns in chronological order.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// The last assistant reply, if any.
    pub fn last_reply(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == crate::turn::Role::Assistant)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.clone()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}
