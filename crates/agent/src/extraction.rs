//! Field extraction: pulling `(field, value)` pairs out of a user message.
//!
//! Three strategies share the [`FieldExtractor`] trait:
//! - [`PatternExtractor`] recognizes `field = v`, `field: v` and `field is v`
//! - [`CompletionExtractor`] asks the completion port for structured output
//! - [`HybridExtractor`] runs the pattern pass first and asks the port only
//!   for the fields it did not find

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use slotflow_config::ExtractionStrategy;
use slotflow_core::completion::{CompletionPort, Prompt};
use slotflow_core::error::ExtractionError;
use slotflow_core::ledger::FieldValue;
use slotflow_core::schema::FieldGroupSpec;
use slotflow_core::turn::{Turn, format_history};
use tracing::{debug, warn};

use crate::prompts;

/// Turns visible to the completion extractor.
const EXTRACTION_HISTORY: usize = 4;

#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Pairs found in `input` for the fields of `spec`.
    async fn extract(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
        history: &[Turn],
    ) -> Result<Vec<FieldValue>, ExtractionError>;
}

/// Build the extractor for a configured strategy.
pub fn extractor_for(
    strategy: ExtractionStrategy,
    port: Arc<dyn CompletionPort>,
) -> Arc<dyn FieldExtractor> {
    match strategy {
        ExtractionStrategy::Pattern => Arc::new(PatternExtractor::new()),
        ExtractionStrategy::Completion => Arc::new(CompletionExtractor::new(port)),
        ExtractionStrategy::Hybrid => Arc::new(HybridExtractor::new(port)),
    }
}

/// Deterministic extraction of explicit assignments.
///
/// A mention whose clause ends in `?` is a question, not an answer, and is
/// skipped. So are hedges such as "I don't know yet". Compiled patterns are
/// cached per field set.
#[derive(Debug, Default)]
pub struct PatternExtractor {
    patterns: Mutex<HashMap<String, Regex>>,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self, spec: &FieldGroupSpec) -> Result<Regex, ExtractionError> {
        let names: Vec<String> = spec
            .required_fields
            .iter()
            .map(|f| regex::escape(f))
            .collect();
        let source = format!(r"(?i)\b({})\b\s*(?:=|:|\bis\b)\s*", names.join("|"));

        let mut cache = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pattern) = cache.get(&source) {
            return Ok(pattern.clone());
        }
        let pattern = Regex::new(&source).map_err(|e| ExtractionError::Rejected(e.to_string()))?;
        cache.insert(source, pattern.clone());
        Ok(pattern)
    }

    /// Synchronous core of the pattern strategy.
    pub fn find(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
    ) -> Result<Vec<FieldValue>, ExtractionError> {
        if spec.required_fields.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = self.pattern(spec)?;

        // (canonical field name, value start, match start)
        let mentions: Vec<(&str, usize, usize)> = pattern
            .captures_iter(input)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?.as_str();
                let field = spec
                    .required_fields
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(name))?;
                Some((field.as_str(), whole.end(), whole.start()))
            })
            .collect();

        let mut pairs = Vec::with_capacity(mentions.len());
        for (i, (field, value_start, _)) in mentions.iter().enumerate() {
            let value_end = mentions
                .get(i + 1)
                .map(|(_, _, next_start)| *next_start)
                .unwrap_or(input.len());
            let (clause, is_question) = first_clause(&input[*value_start..value_end]);
            if is_question {
                debug!(field = %field, "Skipping question about field");
                continue;
            }
            let value = clean_value(clause);
            if value.is_empty() || is_non_answer(value) {
                continue;
            }
            pairs.push(FieldValue::new(*field, value));
        }
        Ok(pairs)
    }
}

/// Text up to the first sentence terminator, and whether that terminator is `?`.
fn first_clause(segment: &str) -> (&str, bool) {
    for (i, c) in segment.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let rest = &segment[i + c.len_utf8()..];
            if rest.chars().next().is_none_or(char::is_whitespace) {
                return (&segment[..i], c == '?');
            }
        }
    }
    (segment, false)
}

const INTERROGATIVES: &[&str] = &["what", "which", "who", "whom", "why", "how", "when", "where"];

const HEDGES: &[&str] = &[
    "don't know",
    "do not know",
    "dont know",
    "not sure",
    "no idea",
    "no clue",
    "can't remember",
];

const PLACEHOLDERS: &[&str] = &[
    "required", "needed", "missing", "unknown", "tbd", "tba", "n/a", "pending", "later",
];

/// Questions, hedges and placeholders that only look like values.
fn is_non_answer(value: &str) -> bool {
    let lower = value.to_lowercase().replace('\u{2019}', "'");
    let first_word = lower
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or_default();

    INTERROGATIVES.contains(&first_word)
        || PLACEHOLDERS.contains(&lower.as_str())
        || HEDGES.iter().any(|h| lower.contains(h))
}

/// Trim separators, a dangling "and" and surrounding quotes.
fn clean_value(raw: &str) -> &str {
    let mut value = raw;
    loop {
        let before = value.len();
        value = value.trim().trim_end_matches([',', ';', '.', '!', '?']);
        let tail = value.len().saturating_sub(4);
        if value.get(tail..).is_some_and(|t| t.eq_ignore_ascii_case(" and")) {
            value = &value[..tail];
        }
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let (first, last) = (bytes[0], bytes[value.len() - 1]);
            if first == last && matches!(first, b'"' | b'\'' | b'`') {
                value = &value[1..value.len() - 1];
            }
        }
        if value.len() == before {
            return value;
        }
    }
}

#[async_trait]
impl FieldExtractor for PatternExtractor {
    async fn extract(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
        _history: &[Turn],
    ) -> Result<Vec<FieldValue>, ExtractionError> {
        self.find(spec, input)
    }
}

/// Extraction through the completion port's structured output.
pub struct CompletionExtractor {
    port: Arc<dyn CompletionPort>,
}

impl CompletionExtractor {
    pub fn new(port: Arc<dyn CompletionPort>) -> Self {
        Self { port }
    }

    fn output_schema(fields: &[&str]) -> Value {
        let properties: Map<String, Value> = fields
            .iter()
            .map(|f| ((*f).to_string(), json!({"type": ["string", "null"]})))
            .collect();
        json!({"type": "object", "properties": properties})
    }

    /// Ask only for `fields`, which must belong to `spec`.
    async fn extract_fields(
        &self,
        fields: &[&str],
        input: &str,
        history: &[Turn],
    ) -> Result<Vec<FieldValue>, ExtractionError> {
        let start = history.len().saturating_sub(EXTRACTION_HISTORY);
        let prompt = Prompt::new(prompts::EXTRACT_SYSTEM, prompts::EXTRACT_HUMAN)
            .var("fields", fields.join(", "))
            .var("history", format_history(&history[start..], prompts::NO_HISTORY))
            .var("input", input);

        let raw = self
            .port
            .classify(&prompt, &Self::output_schema(fields))
            .await?;
        let object = raw
            .as_object()
            .ok_or_else(|| ExtractionError::Rejected("output is not an object".into()))?;

        let pairs = fields
            .iter()
            .filter_map(|field| {
                let value = match object.get(*field)? {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                (!value.is_empty() && !is_non_answer(&value)).then(|| FieldValue::new(*field, value))
            })
            .collect();
        Ok(pairs)
    }
}

#[async_trait]
impl FieldExtractor for CompletionExtractor {
    async fn extract(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
        history: &[Turn],
    ) -> Result<Vec<FieldValue>, ExtractionError> {
        let fields: Vec<&str> = spec.required_fields.iter().map(String::as_str).collect();
        self.extract_fields(&fields, input, history).await
    }
}

/// Pattern pass, then the completion port for whatever is still missing.
pub struct HybridExtractor {
    pattern: PatternExtractor,
    completion: CompletionExtractor,
}

impl HybridExtractor {
    pub fn new(port: Arc<dyn CompletionPort>) -> Self {
        Self {
            pattern: PatternExtractor::new(),
            completion: CompletionExtractor::new(port),
        }
    }
}

#[async_trait]
impl FieldExtractor for HybridExtractor {
    async fn extract(
        &self,
        spec: &FieldGroupSpec,
        input: &str,
        history: &[Turn],
    ) -> Result<Vec<FieldValue>, ExtractionError> {
        let mut pairs = self.pattern.find(spec, input)?;
        let missing: Vec<&str> = spec
            .required_fields
            .iter()
            .map(String::as_str)
            .filter(|f| !pairs.iter().any(|p| p.field == *f))
            .collect();

        if missing.is_empty() {
            return Ok(pairs);
        }

        match self.completion.extract_fields(&missing, input, history).await {
            Ok(extra) => {
                debug!(pattern = pairs.len(), completion = extra.len(), "Hybrid extraction");
                pairs.extend(extra);
            }
            Err(e) => warn!(error = %e, "Completion extraction failed, keeping pattern results"),
        }
        Ok(pairs)
    }
}
