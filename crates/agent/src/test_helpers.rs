//! Shared test helpers for agent tests.

use async_trait::async_trait;
use serde_json::Value;
use slotflow_core::completion::{CompletionPort, Prompt};
use slotflow_core::error::{CompletionError, ProviderError};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Json(Value),
    Fail(CompletionError),
}

/// A call the port received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: &'static str,
    pub system: String,
    pub human: String,
}

/// A mock completion port that answers from a queue.
///
/// Each call to `generate` or `classify` consumes the next answer.
/// Panics if more calls are made than answers provided.
pub struct SequentialMockPort {
    answers: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl SequentialMockPort {
    pub fn new(answers: Vec<Scripted>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self, kind: &'static str, prompt: &Prompt) -> Scripted {
        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            system: prompt.render_system(),
            human: prompt.render_human(),
        });
        let mut answers = self.answers.lock().unwrap();
        match answers.pop_front() {
            Some(answer) => answer,
            None => panic!(
                "SequentialMockPort: no more answers ({kind} call #{})",
                self.calls.lock().unwrap().len()
            ),
        }
    }
}

#[async_trait]
impl CompletionPort for SequentialMockPort {
    async fn generate(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        match self.next("generate", prompt) {
            Scripted::Text(text) => Ok(text),
            Scripted::Json(value) => Ok(value.to_string()),
            Scripted::Fail(err) => Err(err),
        }
    }

    async fn classify(&self, prompt: &Prompt, _schema: &Value) -> Result<Value, CompletionError> {
        match self.next("classify", prompt) {
            Scripted::Json(value) => Ok(value),
            Scripted::Text(text) => serde_json::from_str(&text)
                .map_err(|e| CompletionError::parse(e.to_string(), text)),
            Scripted::Fail(err) => Err(err),
        }
    }
}

pub fn text(s: &str) -> Scripted {
    Scripted::Text(s.to_string())
}

pub fn json(value: Value) -> Scripted {
    Scripted::Json(value)
}

/// A routing classification.
pub fn route(intent: &str, confidence: f64) -> Scripted {
    Scripted::Json(serde_json::json!({
        "intent": intent,
        "confidence": confidence,
        "reasoning": format!("looks like {intent}"),
    }))
}

pub fn network_failure() -> Scripted {
    Scripted::Fail(CompletionError::Provider(ProviderError::Network(
        "connection reset".into(),
    )))
}
