//! Shared test helpers for runner, middleware and orchestrator tests.

use roundtable_core::backend::{CompletionBackend, CompletionRequest, CompletionResult};
use roundtable_core::error::BackendError;
use roundtable_core::tool::{ToolCallRequest, ToolDescriptor};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

type Handler =
    Box<dyn Fn(&CompletionRequest) -> Result<CompletionResult, BackendError> + Send + Sync>;
type Delay = Box<dyn Fn(&CompletionRequest) -> Duration + Send + Sync>;

/// A backend whose answers come from a closure, recording every request.
pub struct ScriptedBackend {
    handler: Handler,
    delay: Option<Delay>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(
        handler: impl Fn(&CompletionRequest) -> Result<CompletionResult, BackendError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text and no tool calls.
    pub fn text(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(CompletionResult::text(text.clone())))
    }

    /// Answer with each response in turn.
    ///
    /// Panics if more calls are made than responses provided.
    pub fn sequence(responses: Vec<Result<CompletionResult, BackendError>>) -> Self {
        let total = responses.len();
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue.lock().unwrap().pop_front().unwrap_or_else(|| {
                panic!("ScriptedBackend: no more responses (have {total})")
            })
        })
    }

    /// Sleep before answering, for a duration chosen per request.
    pub fn with_delay(
        mut self,
        delay: impl Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&request)).await;
        }
        (self.handler)(&request)
    }
}

/// A tool descriptor with an empty object schema.
pub fn descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        format!("The {name} tool"),
        serde_json::json!({ "type": "object", "properties": {} }),
    )
}

/// A tool call request with `{}` arguments.
pub fn tool_call(id: &str, name: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, serde_json::json!({}))
}

/// A result carrying text plus the given tool calls.
pub fn tool_call_result(text: &str, calls: Vec<ToolCallRequest>) -> CompletionResult {
    CompletionResult::text(text).with_tool_calls(calls)
}
