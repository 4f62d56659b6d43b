//! Deterministic collaborator stubs for the unit and integration tests.
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for `tests/`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline::{
    ChatMessage, CollectorError, ContentNormalizer, GatewayError, LlmGateway, NormalizerError,
    RunConfig, RunState, SourceCollector, SourceRecord, Timestamp,
};
use tokio_util::sync::CancellationToken;

use crate::WorkflowEngine;

/// A state that went through `normalize` with the given prompt.
pub fn normalized_state(prompt: &str, config: RunConfig) -> RunState {
    let mut state = RunState::new(prompt, config);
    crate::stages::normalize(&mut state).unwrap();
    state
}

/// A normalized state with `queries` as its plan.
pub fn planned_state(queries: &[&str], config: RunConfig) -> RunState {
    let mut state = normalized_state(&format!("prompt for {}", queries.join(" ")), config);
    state
        .set_queries(queries.iter().map(|q| q.to_string()).collect())
        .unwrap();
    state
}

/// `n` distinct sources whose title and content mention `prefix`.
pub fn sources(prefix: &str, n: usize) -> Vec<SourceRecord> {
    let path = prefix.replace(' ', "-");
    (0..n)
        .map(|i| {
            SourceRecord::new(
                format!("https://example.org/{path}/{i}"),
                format!("{prefix} title {i}"),
                format!("{prefix} content {i}"),
                Timestamp::now(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------

/// LLM stub returning one fixed answer (or error) and recording every request.
pub struct ScriptedLlm {
    answer: Result<String, GatewayError>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn always(answer: impl Into<String>) -> Self {
        Self {
            answer: Ok(answer.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GatewayError) -> Self {
        Self {
            answer: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.answer.clone()
    }
}

// ---------------------------------------------------------------------------

type CollectorScript = dyn Fn(&str, usize) -> Result<usize, CollectorError> + Send + Sync;

/// Collector stub: the script maps `(query, pass)` to a source count or an
/// error, where `pass` counts previous searches for the same query.
pub struct ScriptedCollector {
    script: Box<CollectorScript>,
    passes: Mutex<HashMap<String, usize>>,
}

impl ScriptedCollector {
    pub fn new(
        script: impl Fn(&str, usize) -> Result<usize, CollectorError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            passes: Mutex::new(HashMap::new()),
        }
    }

    pub fn always(count: usize) -> Self {
        Self::new(move |_, _| Ok(count))
    }
}

#[async_trait]
impl SourceCollector for ScriptedCollector {
    async fn search(
        &self,
        query: &str,
        _min_count: usize,
        _max_count: usize,
    ) -> Result<Vec<SourceRecord>, CollectorError> {
        let pass = {
            let mut passes = self.passes.lock().unwrap();
            let counter = passes.entry(query.to_string()).or_insert(0);
            let pass = *counter;
            *counter += 1;
            pass
        };
        (self.script)(query, pass).map(|n| sources(query, n))
    }
}

// ---------------------------------------------------------------------------

/// Normalizer stub returning its input unchanged.
pub struct PassThroughNormalizer;

#[async_trait]
impl ContentNormalizer for PassThroughNormalizer {
    async fn normalize(&self, texts: Vec<String>) -> Result<Vec<String>, NormalizerError> {
        Ok(texts)
    }
}

/// Normalizer stub that always fails.
pub struct FailingNormalizer;

#[async_trait]
impl ContentNormalizer for FailingNormalizer {
    async fn normalize(&self, _texts: Vec<String>) -> Result<Vec<String>, NormalizerError> {
        Err(NormalizerError::Unavailable {
            message: "container not running".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------

/// Which stage an LLM request came from, recognised by its system message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Plan,
    Draft,
    Review,
}

fn classify(messages: &[ChatMessage]) -> CallKind {
    let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
    if system.starts_with("You plan") {
        CallKind::Plan
    } else if system.starts_with("You review") {
        CallKind::Review
    } else {
        CallKind::Draft
    }
}

pub const QUERY_PLAN: &str = "1. x history\n2. x design\n3. x criticism";

pub const GOOD_DRAFT: &str = "# Explaining X\n\n## Summary\n\nX is explained here in enough detail.\n\n## Sources\n\n- https://example.org";

/// LLM stub answering by call kind and recording the user message of every
/// call. Kinds without a scripted answer fail with `GatewayError::Timeout`.
pub struct RoutingLlm {
    answers: HashMap<CallKind, String>,
    calls: Mutex<Vec<(CallKind, String)>>,
    cancel_on_review: Option<CancellationToken>,
}

impl RoutingLlm {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            cancel_on_review: None,
        }
    }

    /// Plan, draft and review all succeed with sensible answers.
    pub fn healthy() -> Self {
        Self::new()
            .answer(CallKind::Plan, QUERY_PLAN)
            .answer(CallKind::Draft, GOOD_DRAFT)
            .answer(CallKind::Review, "- looks complete")
    }

    pub fn answer(mut self, kind: CallKind, text: &str) -> Self {
        self.answers.insert(kind, text.to_string());
        self
    }

    pub fn without(mut self, kind: CallKind) -> Self {
        self.answers.remove(&kind);
        self
    }

    pub fn cancel_on_review(mut self, token: CancellationToken) -> Self {
        self.cancel_on_review = Some(token);
        self
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.prompts(kind).len()
    }

    /// User messages sent for `kind`, in call order.
    pub fn prompts(&self, kind: CallKind) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

impl Default for RoutingLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmGateway for RoutingLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        let kind = classify(messages);
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls.lock().unwrap().push((kind, user));
        if kind == CallKind::Review {
            if let Some(token) = &self.cancel_on_review {
                token.cancel();
            }
        }
        self.answers.get(&kind).cloned().ok_or(GatewayError::Timeout)
    }
}

/// LLM stub returning the same text for every call.
pub struct ConstantLlm(pub String);

#[async_trait]
impl LlmGateway for ConstantLlm {
    async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, GatewayError> {
        Ok(self.0.clone())
    }
}

/// An engine over `llm` and `collector` with a pass-through normalizer.
pub fn engine(llm: Arc<dyn LlmGateway>, collector: Arc<dyn SourceCollector>) -> WorkflowEngine {
    WorkflowEngine::new(llm, collector, Arc::new(PassThroughNormalizer))
}
