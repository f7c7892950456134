//! End-to-end tests for the Slotflow turn pipeline.
//!
//! These drive the orchestrator through the real provider-backed completion
//! port, with a scripted provider standing in for the LLM.

use std::path::Path;
use std::sync::{Arc, Mutex};

use slotflow_agent::{ExtractedText, Orchestrator, TextExtractor, TurnError};
use slotflow_config::{AppConfig, ExtractionStrategy};
use slotflow_core::error::{CompletionError, IngestError, ProviderError};
use slotflow_core::event::ConversationEvent;
use slotflow_core::ledger::CollectorState;
use slotflow_core::provider::{ChatRole, Provider, ProviderRequest, ProviderResponse, Usage};
use slotflow_core::schema::CollectorId;
use slotflow_core::session::ConversationSession;
use slotflow_core::turn::Role;
use slotflow_providers::ProviderCompletionPort;

// ── Mock Provider ────────────────────────────────────────────────────────

enum Reply {
    Text(String),
    NetworkDown,
}

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    replies: Mutex<Vec<Reply>>,
    seen: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.seen.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut seen = self.seen.lock().unwrap();
        let index = seen.len();
        seen.push(request);

        let replies = self.replies.lock().unwrap();
        match replies.get(index) {
            Some(Reply::Text(text)) => Ok(ProviderResponse {
                content: text.clone(),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock".into(),
            }),
            Some(Reply::NetworkDown) => Err(ProviderError::Network("connection reset".into())),
            None => panic!(
                "ScriptedProvider exhausted: call #{index}, have {}",
                replies.len()
            ),
        }
    }
}

fn text(reply: &str) -> Reply {
    Reply::Text(reply.to_string())
}

fn route(intent: &str, confidence: f64) -> Reply {
    Reply::Text(
        serde_json::json!({
            "intent": intent,
            "confidence": confidence,
            "reasoning": format!("the user is talking about {intent}"),
        })
        .to_string(),
    )
}

struct TwoPageExtractor;

impl TextExtractor for TwoPageExtractor {
    fn extract(&self, _path: &Path) -> Result<ExtractedText, IngestError> {
        Ok(ExtractedText {
            pages: vec!["Revenue grew.".into(), "Costs fell.".into()],
            ..ExtractedText::default()
        })
    }
}

fn config(docs: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.documents.base_dir = docs.to_path_buf();
    config.extraction.strategy = ExtractionStrategy::Pattern;
    config
}

fn orchestrator(provider: Arc<ScriptedProvider>, config: &AppConfig) -> Orchestrator {
    let port = Arc::new(ProviderCompletionPort::from_config(provider, config));
    Orchestrator::new(port, config).with_text_extractor(Arc::new(TwoPageExtractor))
}

// ── E2E: Field collection ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_alpha_collected_over_two_turns() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        route("alpha", 0.93),
        text("Thanks! What is field_b?"),
        route("alpha", 0.9),
        text("All of alpha is in."),
    ]);
    let orch = orchestrator(provider.clone(), &config(dir.path()));
    let mut session = ConversationSession::new();

    let first = orch
        .handle_turn(&mut session, "I want to give you field_a = 7")
        .await
        .unwrap();
    assert_eq!(first.reply.as_deref(), Some("Thanks! What is field_b?"));
    assert_eq!(first.state, Some(CollectorState::Partial));
    let alpha = session.ledger.fields(CollectorId::Alpha).unwrap();
    assert_eq!(alpha.values.len(), 1);
    assert_eq!(alpha.values["field_a"], "7");
    assert!(!alpha.complete);

    let second = orch
        .handle_turn(&mut session, "field_b is 9, field_c is 2")
        .await
        .unwrap();
    assert_eq!(second.state, Some(CollectorState::Complete));
    let alpha = session.ledger.fields(CollectorId::Alpha).unwrap();
    assert!(alpha.complete);
    assert_eq!(alpha.values["field_b"], "9");
    assert_eq!(alpha.values["field_c"], "2");

    // user, router note, assistant per turn
    let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Router,
            Role::Assistant,
            Role::User,
            Role::Router,
            Role::Assistant
        ]
    );
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn e2e_router_request_is_deterministic_json() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![route("beta", 0.8), text("What is field_e?")]);
    let orch = orchestrator(provider.clone(), &config(dir.path()));
    let mut session = ConversationSession::new();

    orch.handle_turn(&mut session, "field_d = blue").await.unwrap();

    let classify = provider.request(0);
    assert_eq!(classify.model, "gpt-4o-mini");
    assert!(classify.temperature.abs() < f32::EPSILON);
    assert_eq!(classify.messages[0].role, ChatRole::System);
    assert!(classify.messages[0].content.contains("JSON"));
    assert!(classify.messages[1].content.contains("field_d = blue"));

    let reply = provider.request(1);
    assert!((reply.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(reply.max_tokens, Some(1024));
}

#[tokio::test]
async fn e2e_code_fenced_classification_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        text("```json\n{\"intent\": \"gamma\", \"confidence\": 0.7, \"reasoning\": \"field_f\"}\n```"),
        text("Noted field_f."),
    ]);
    let orch = orchestrator(provider, &config(dir.path()));
    let mut session = ConversationSession::new();

    let outcome = orch.handle_turn(&mut session, "field_f: 12").await.unwrap();
    assert_eq!(outcome.handled_by, Some(CollectorId::Gamma));
    assert_eq!(
        session.ledger.fields(CollectorId::Gamma).unwrap().values["field_f"],
        "12"
    );
}

// ── E2E: Summary ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_summary_on_empty_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        route("summary", 0.95),
        text("Let's start with alpha whenever you're ready."),
    ]);
    let orch = orchestrator(provider, &config(dir.path()));
    let mut session = ConversationSession::new();

    let outcome = orch
        .handle_turn(&mut session, "give me a summary")
        .await
        .unwrap();

    let reply = outcome.reply.unwrap();
    assert!(reply.starts_with("Summary:\n"));
    assert!(reply.contains("No data has been collected yet."));
    assert!(session.ledger.is_empty());
    assert_eq!(outcome.state, None);
}

// ── E2E: Documents ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_missing_document_reprompts() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![route("document", 0.9)]);
    let orch = orchestrator(provider.clone(), &config(dir.path()));
    let mut session = ConversationSession::new();

    let outcome = orch
        .handle_turn(&mut session, "please load report.pdf")
        .await
        .unwrap();

    assert!(outcome.reply.unwrap().contains("valid path"));
    let entry = session.ledger.document().unwrap();
    assert!(!entry.complete);
    assert!(entry.error.as_deref().unwrap().contains("report.pdf"));
    // Only the routing call; the reply is not generated
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_document_loaded_then_summarized() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("q3.pdf"), b"%PDF-1.5").unwrap();
    let provider = ScriptedProvider::new(vec![
        route("document", 0.9),
        route("summary", 0.9),
        text("You shared the Q3 report."),
    ]);
    let orch = orchestrator(provider.clone(), &config(dir.path()));
    let mut events = orch.events().subscribe();
    let mut session = ConversationSession::new();

    let loaded = orch.handle_turn(&mut session, "load q3.pdf").await.unwrap();
    assert_eq!(
        loaded.reply.as_deref(),
        Some("PDF loaded successfully: q3.pdf (2 pages). Extracted 25 characters of text.")
    );
    assert_eq!(loaded.state, Some(CollectorState::Complete));

    let summary = orch.handle_turn(&mut session, "summarize please").await.unwrap();
    assert_eq!(summary.reply.as_deref(), Some("Summary:\nYou shared the Q3 report."));

    let narration = provider.request(2);
    let human = &narration.messages[1].content;
    assert!(human.contains("filename: q3.pdf"));
    assert!(human.contains("Revenue grew.\nCosts fell."));

    let mut ingested = false;
    while let Ok(event) = events.try_recv() {
        if let ConversationEvent::DocumentIngested { page_count, .. } = &*event {
            assert_eq!(*page_count, 2);
            ingested = true;
        }
    }
    assert!(ingested);
}

// ── E2E: Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_completion_failure_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        route("alpha", 0.9),
        text("What is field_b?"),
        route("alpha", 0.9),
        Reply::NetworkDown,
    ]);
    let orch = orchestrator(provider, &config(dir.path()));
    let mut session = ConversationSession::new();

    orch.handle_turn(&mut session, "field_a = 7").await.unwrap();
    let before = session.to_json().unwrap();

    let err = orch
        .handle_turn(&mut session, "field_b is 9")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TurnError::Completion(CompletionError::Provider(ProviderError::Network(_)))
    ));
    assert_eq!(session.to_json().unwrap(), before);
}

#[tokio::test]
async fn e2e_unknown_intent_gets_fallback_reply() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![route("delta", 0.6)]);
    let orch = orchestrator(provider, &config(dir.path()));
    let mut session = ConversationSession::new();

    let outcome = orch.handle_turn(&mut session, "tell me a joke").await.unwrap();

    assert!(outcome.routing_error.unwrap().contains("delta"));
    assert!(outcome.reply.unwrap().starts_with("I'm not sure what you'd like to do."));
    assert!(session.ledger.is_empty());
    assert!(session.last_decision.is_none());
    assert_eq!(session.turns().len(), 2);
}

#[tokio::test]
async fn e2e_none_intent_without_fallback_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.routing.fallback_reply = false;
    let provider = ScriptedProvider::new(vec![route("none", 0.4)]);
    let orch = orchestrator(provider, &config);
    let mut session = ConversationSession::new();

    let outcome = orch.handle_turn(&mut session, "hmm").await.unwrap();

    assert!(outcome.reply.is_none());
    assert_eq!(outcome.decision.unwrap().target, None);
    let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Router]);
}
