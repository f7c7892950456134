//! The turn pipeline.
//!
//! 1. **Route** the input (router sees prior history and ledger progress)
//! 2. **Dispatch** to a field collector, the document ingestor or the summarizer
//! 3. **Commit** user turn, routing note and reply to the session
//! 4. **Publish** conversation events
//!
//! Every turn runs on a draft copy of the session. The draft replaces the
//! session only when the turn succeeds, so a failed completion call leaves
//! the session exactly as it was.

use std::sync::Arc;

use chrono::Utc;
use slotflow_config::AppConfig;
use slotflow_core::completion::CompletionPort;
use slotflow_core::error::{CompletionError, SchemaError};
use slotflow_core::event::{ConversationEvent, EventBus};
use slotflow_core::ledger::CollectorState;
use slotflow_core::schema::{CollectorId, CollectorKind, SchemaRegistry};
use slotflow_core::session::{ConversationSession, RoutingDecision, TurnScratch};
use slotflow_core::turn::Turn;
use tracing::{info, warn};

use crate::collector::CollectorMachine;
use crate::extraction::extractor_for;
use crate::ingest::{DocumentIngestor, IngestOutcome, TextExtractor};
use crate::prompts;
use crate::router::{IntentRouter, RouteError};
use crate::summarizer::Summarizer;

/// Why a turn was aborted. The session is unchanged in every case.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// What one successful turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// `None` when routing failed and fallback replies are disabled.
    pub reply: Option<String>,
    pub decision: Option<RoutingDecision>,
    pub routing_error: Option<String>,
    /// Handler that answered, if any.
    pub handled_by: Option<CollectorId>,
    /// Progress of the handling slot after the turn.
    pub state: Option<CollectorState>,
}

/// Owns the handlers; holds no session state.
pub struct Orchestrator {
    registry: Arc<SchemaRegistry>,
    router: IntentRouter,
    collector: CollectorMachine,
    ingestor: DocumentIngestor,
    summarizer: Summarizer,
    events: Arc<EventBus>,
    fallback_reply: bool,
}

impl Orchestrator {
    /// Wire every handler to `port` using the given configuration.
    pub fn new(port: Arc<dyn CompletionPort>, config: &AppConfig) -> Self {
        let registry = Arc::new(SchemaRegistry::standard());
        let extractor = extractor_for(config.extraction.strategy, Arc::clone(&port));

        Self {
            router: IntentRouter::new(Arc::clone(&port), Arc::clone(&registry))
                .with_history_window(config.routing.history_window),
            collector: CollectorMachine::new(Arc::clone(&port), extractor)
                .with_history_window(config.collectors.history_window),
            ingestor: DocumentIngestor::new(&config.documents.base_dir, &config.documents.extension),
            summarizer: Summarizer::new(port)
                .with_history_window(config.summary.history_window)
                .with_excerpt_chars(config.summary.excerpt_chars),
            registry,
            events: Arc::new(EventBus::default()),
            fallback_reply: config.routing.fallback_reply,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.ingestor = self.ingestor.with_extractor(extractor);
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Process one user turn against `session`.
    pub async fn handle_turn(
        &self,
        session: &mut ConversationSession,
        input: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let mut draft = session.clone();
        draft.scratch = TurnScratch {
            user_input: input.to_string(),
            ..TurnScratch::default()
        };
        let session_id = draft.id.to_string();
        let mut events = Vec::new();

        let decision = match self.router.route(input, draft.turns(), &draft.ledger).await {
            Ok(decision) => decision,
            Err(RouteError::Completion(e)) => return Err(e.into()),
            Err(RouteError::Rejected(e)) => {
                warn!(error = %e, "Routing failed");
                let reason = e.to_string();
                draft.last_decision = None;
                draft.scratch.routing_error = Some(reason.clone());
                draft.push(Turn::user(input));
                let reply = self.fallback(&mut draft);
                events.push(ConversationEvent::RoutingFailed {
                    session_id,
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                self.commit(session, draft, events);
                return Ok(TurnOutcome {
                    reply,
                    decision: None,
                    routing_error: Some(reason),
                    handled_by: None,
                    state: None,
                });
            }
        };

        events.push(ConversationEvent::TurnRouted {
            session_id: session_id.clone(),
            target: decision.target,
            confidence: decision.confidence,
            timestamp: Utc::now(),
        });
        draft.last_decision = Some(decision.clone());

        let Some(target) = decision.target else {
            draft.push(Turn::user(input));
            draft.push(decision.to_turn());
            let reply = self.fallback(&mut draft);
            self.commit(session, draft, events);
            return Ok(TurnOutcome {
                reply,
                decision: Some(decision),
                routing_error: None,
                handled_by: None,
                state: None,
            });
        };

        let reply = match target.kind() {
            CollectorKind::FieldGroup => {
                let spec = self.registry.lookup(target)?;
                let step = self
                    .collector
                    .advance(spec, input, draft.turns(), draft.ledger.fields(target))
                    .await?;
                if !step.report.updated.is_empty() {
                    events.push(ConversationEvent::FieldsMerged {
                        session_id: session_id.clone(),
                        collector: target,
                        fields: step.report.updated.clone(),
                        timestamp: Utc::now(),
                    });
                }
                if step.report.completed {
                    events.push(ConversationEvent::CollectorCompleted {
                        session_id: session_id.clone(),
                        collector: target,
                        timestamp: Utc::now(),
                    });
                }
                draft.ledger.put_fields(target, step.entry);
                step.reply
            }
            CollectorKind::Document => {
                let step = self.ingestor.handle(input, draft.ledger.document()).await;
                match &step.outcome {
                    IngestOutcome::Loaded {
                        filename,
                        page_count,
                    } => events.push(ConversationEvent::DocumentIngested {
                        session_id: session_id.clone(),
                        filename: filename.clone(),
                        page_count: *page_count,
                        timestamp: Utc::now(),
                    }),
                    IngestOutcome::Failed(reason) => events.push(ConversationEvent::IngestFailed {
                        session_id: session_id.clone(),
                        reason: reason.clone(),
                        timestamp: Utc::now(),
                    }),
                    IngestOutcome::Requested => {}
                }
                draft.ledger.put_document(step.entry);
                step.reply
            }
            CollectorKind::Summary => {
                self.summarizer
                    .summarize(&draft.ledger, draft.turns())
                    .await?
            }
        };

        draft.push(Turn::user(input));
        draft.push(decision.to_turn());
        draft.push(Turn::assistant(reply.clone()));
        draft.scratch.handled_by = Some(target);

        let state = match target.kind() {
            CollectorKind::Summary => None,
            _ => Some(draft.ledger.state(target)),
        };

        info!(collector = %target, ?state, "Turn handled");
        self.commit(session, draft, events);

        Ok(TurnOutcome {
            reply: Some(reply),
            decision: Some(decision),
            routing_error: None,
            handled_by: Some(target),
            state,
        })
    }

    /// Append the fallback reply if enabled.
    fn fallback(&self, draft: &mut ConversationSession) -> Option<String> {
        if !self.fallback_reply {
            return None;
        }
        let reply = prompts::fallback_reply(&self.registry);
        draft.push(Turn::assistant(reply.clone()));
        Some(reply)
    }

    fn commit(
        &self,
        session: &mut ConversationSession,
        draft: ConversationSession,
        events: Vec<ConversationEvent>,
    ) {
        *session = draft;
        for event in events {
            self.events.publish(event);
        }
    }
}
