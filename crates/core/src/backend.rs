//! CompletionBackend trait, the abstraction over language-model transports.
//!
//! A backend takes a message list, a model identifier and optional tool
//! parameters, and returns the fully assembled result of one completion.
//! Streaming, retries and timeouts all live behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::Message;
use crate::tool::{ToolCallRequest, ToolChoice, ToolDescriptor};

/// Backend-specific knobs, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Temperature (0.0 = deterministic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Anything else the backend understands
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A structured-output constraint: the backend must answer with JSON
/// matching `schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// One completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Opaque model identifier
    pub model: String,

    /// The conversation so far
    pub messages: Vec<Message>,

    /// Tools the model may call; empty means none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,

    /// Force a call to one specific tool; `None` lets the model decide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Structured output constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<ResponseSchema>,

    #[serde(default)]
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            response_schema: None,
            options: CompletionOptions::default(),
        }
    }
}

/// Citation metadata attached to a generated message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            url: None,
            snippet: None,
        }
    }
}

/// The assembled result of one round.
///
/// An empty `tool_calls` list is the termination signal for the
/// orchestrator; `references` is populated whether or not tools were called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// The generated assistant message
    pub message: Message,

    /// Tool calls requested by the model, in the order produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Citations attached to the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl CompletionResult {
    /// A text-only result with no tool calls or references.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content.into()),
            tool_calls: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRequest>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The core CompletionBackend trait.
///
/// Every transport (HTTP API, local model, scripted test double) implements
/// this. Implementations must tolerate concurrent calls: forced-tool rounds
/// issue several requests at once.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Send a request and get the complete result.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, BackendError>;

    /// Blocking form of [`complete`](Self::complete).
    ///
    /// Drives the future on the current thread. Must not be called from
    /// inside an async runtime.
    fn complete_blocking(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResult, BackendError> {
        futures::executor::block_on(self.complete(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResult, BackendError> {
            let last = request
                .messages
                .last()
                .map(|m| m.text())
                .unwrap_or_default();
            Ok(CompletionResult::text(last))
        }
    }

    #[test]
    fn blocking_form_drives_async_complete() {
        let request = CompletionRequest::new("echo-1", vec![Message::user("ping")]);
        let result = EchoBackend.complete_blocking(request).unwrap();
        assert_eq!(result.message.text(), "ping");
        assert!(!result.has_tool_calls());
    }

    #[test]
    fn request_omits_empty_fields() {
        let request = CompletionRequest::new("gpt-4o", vec![]);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("response_schema").is_none());
    }

    #[test]
    fn result_parses_without_optional_lists() {
        let result = CompletionResult::text("done");
        let json = serde_json::to_string(&result).unwrap();
        let parsed: CompletionResult = serde_json::from_str(&json).unwrap();
        assert!(parsed.tool_calls.is_empty());
        assert!(parsed.references.is_empty());
    }
}
