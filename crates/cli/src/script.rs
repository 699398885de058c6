//! JSON replay scripts: canned backend replies and an echoing tool dispatcher.
//!
//! A script looks like:
//!
//! ```json
//! {
//!   "messages": [{ "role": "user", "content": "What's the weather?" }],
//!   "tools": [{ "name": "weather", "description": "Look up weather", "parameters": {} }],
//!   "replies": [
//!     { "when": { "tool_choice": "weather" },
//!       "content": "", "tool_calls": [{ "id": "c1", "name": "weather", "arguments": {} }] },
//!     { "content": "Sunny." }
//!   ]
//! }
//! ```
//!
//! Each backend request consumes the first unused reply whose `when` clause
//! matches it.

use async_trait::async_trait;
use roundtable_core::backend::{CompletionBackend, CompletionRequest, CompletionResult, Reference};
use roundtable_core::error::{BackendError, ToolError};
use roundtable_core::message::{Message, MessageContent, Role};
use roundtable_core::tool::{ToolCallRequest, ToolDescriptor, ToolDispatcher};
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub messages: Vec<ScriptMessage>,

    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,

    #[serde(default)]
    pub replies: Vec<ScriptedReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptMessage {
    pub role: Role,
    pub content: MessageContent,

    /// Required on `tool` messages: the call this message answers
    #[serde(default)]
    pub tool_call_id: Option<String>,

    /// Calls made by an `assistant` message
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ScriptMessage {
    fn to_message(&self) -> Message {
        let content = self.content.clone();
        match self.role {
            Role::System => Message::system(content),
            Role::User => Message::user(content),
            Role::Assistant => {
                let mut message = Message::assistant(content);
                message.tool_calls = self.tool_calls.clone();
                message
            }
            Role::Tool => {
                Message::tool_result(self.tool_call_id.clone().unwrap_or_default(), content)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedReply {
    #[serde(default)]
    pub when: ReplyMatch,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    #[serde(default)]
    pub references: Vec<Reference>,
}

/// Conditions a request must meet to consume a reply. Unset fields match anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyMatch {
    /// Name of the forced tool choice on the request
    pub tool_choice: Option<String>,
    /// Whether the request asks for a structured planning response
    pub planning: Option<bool>,
    /// Whether the request offers any tools
    pub tools: Option<bool>,
}

impl ReplyMatch {
    fn matches(&self, request: &CompletionRequest) -> bool {
        if let Some(name) = &self.tool_choice {
            if request.tool_choice.as_ref().map(|c| c.name.as_str()) != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(planning) = self.planning {
            if request.response_schema.is_some() != planning {
                return false;
            }
        }
        if let Some(tools) = self.tools {
            if request.tools.is_empty() == tools {
                return false;
            }
        }
        true
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read script {}: {e}", path.display()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let script: Script = serde_json::from_str(raw)?;
        if script.messages.is_empty() {
            return Err("script has no messages".into());
        }
        if let Some(index) = script
            .messages
            .iter()
            .position(|m| m.role == Role::Tool && m.tool_call_id.is_none())
        {
            return Err(format!("script message {index} has role tool but no tool_call_id").into());
        }
        Ok(script)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.iter().map(ScriptMessage::to_message).collect()
    }
}

/// Serves replies from a script, each at most once.
pub struct ScriptBackend {
    replies: Mutex<Vec<Option<ScriptedReply>>>,
}

impl ScriptBackend {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Some).collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .map(|r| r.iter().filter(|slot| slot.is_some()).count())
            .unwrap_or(0)
    }

    fn take_matching(&self, request: &CompletionRequest) -> Option<ScriptedReply> {
        let mut replies = self.replies.lock().ok()?;
        replies
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.when.matches(request)))
            .and_then(Option::take)
    }
}

#[async_trait]
impl CompletionBackend for ScriptBackend {
    fn name(&self) -> &str {
        "script"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, BackendError> {
        let reply = self.take_matching(&request).ok_or_else(|| {
            BackendError::MalformedResponse(format!(
                "no scripted reply left for request (tool_choice: {:?}, planning: {})",
                request.tool_choice.as_ref().map(|c| c.name.as_str()),
                request.response_schema.is_some()
            ))
        })?;

        debug!(
            tool_calls = reply.tool_calls.len(),
            references = reply.references.len(),
            "Serving scripted reply"
        );

        Ok(CompletionResult::text(reply.content)
            .with_tool_calls(reply.tool_calls)
            .with_references(reply.references))
    }
}

/// Answers every tool call with its own arguments.
pub struct EchoDispatcher {
    known: Vec<String>,
}

impl EchoDispatcher {
    pub fn new(tools: &[ToolDescriptor]) -> Self {
        Self {
            known: tools.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

#[async_trait]
impl ToolDispatcher for EchoDispatcher {
    async fn dispatch(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        if !self.known.iter().any(|name| name == &call.name) {
            return Err(ToolError::NotFound(call.name.clone()));
        }
        Ok(format!("{} {}", call.name, call.arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_core::tool::ToolChoice;

    const SCRIPT: &str = r#"{
        "messages": [
            { "role": "system", "content": "Be brief." },
            { "role": "user", "content": "Weather in Oslo?" }
        ],
        "tools": [{ "name": "weather", "description": "Look up weather", "parameters": {} }],
        "replies": [
            { "when": { "tool_choice": "weather" }, "content": "",
              "tool_calls": [{ "id": "c1", "name": "weather", "arguments": { "city": "Oslo" } }] },
            { "content": "Rainy." }
        ]
    }"#;

    #[test]
    fn parses_script() {
        let script = Script::parse(SCRIPT).unwrap();
        let messages = script.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].text(), "Weather in Oslo?");
        assert_eq!(script.tools[0].name, "weather");
        assert_eq!(script.replies.len(), 2);
    }

    #[test]
    fn tool_messages_keep_their_role() {
        let script = Script::parse(
            r#"{
            "messages": [
                { "role": "user", "content": "Weather in Oslo?" },
                { "role": "assistant", "content": "",
                  "tool_calls": [{ "id": "c1", "name": "weather", "arguments": {} }] },
                { "role": "tool", "content": "rain", "tool_call_id": "c1" }
            ]
        }"#,
        )
        .unwrap();
        let messages = script.messages();
        assert_eq!(messages[1].tool_calls[0].id, "c1");
        assert_eq!(messages[2].role, Role::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[2].text(), "rain");
    }

    #[test]
    fn rejects_tool_message_without_call_id() {
        let err = Script::parse(
            r#"{ "messages": [
                { "role": "user", "content": "hi" },
                { "role": "tool", "content": "orphan" }
            ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("message 1"));
    }

    #[test]
    fn rejects_empty_script() {
        assert!(Script::parse(r#"{ "messages": [] }"#).is_err());
        assert!(Script::parse("not json").is_err());
    }

    #[tokio::test]
    async fn first_matching_reply_wins() {
        let script = Script::parse(SCRIPT).unwrap();
        let messages = script.messages();
        let backend = ScriptBackend::new(script.replies);

        // An unforced request skips the tool_choice-gated reply
        let plain = CompletionRequest::new("m", messages);
        let result = backend.complete(plain).await.unwrap();
        assert_eq!(result.message.text(), "Rainy.");
        assert_eq!(backend.remaining(), 1);

        let mut forced = CompletionRequest::new("m", vec![Message::user("hi")]);
        forced.tool_choice = Some(ToolChoice::new("weather"));
        let result = backend.complete(forced).await.unwrap();
        assert_eq!(result.tool_calls[0].arguments["city"], "Oslo");
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_is_malformed_response() {
        let backend = ScriptBackend::new(Vec::new());
        let err = backend
            .complete(CompletionRequest::new("m", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn planning_flag_matches_structured_requests() {
        let raw = r#"{ "when": { "planning": true }, "content": "{\"plan\":\"x\"}" }"#;
        let reply: ScriptedReply = serde_json::from_str(raw).unwrap();
        let backend = ScriptBackend::new(vec![reply]);

        let plain = CompletionRequest::new("m", vec![Message::user("hi")]);
        assert!(backend.complete(plain.clone()).await.is_err());

        let mut planning = plain;
        planning.response_schema = Some(roundtable_core::backend::ResponseSchema {
            name: "plan".into(),
            schema: serde_json::json!({}),
        });
        assert!(backend.complete(planning).await.is_ok());
    }

    #[tokio::test]
    async fn echo_dispatcher_returns_arguments() {
        let tools = vec![ToolDescriptor::new("weather", "w", serde_json::json!({}))];
        let dispatcher = EchoDispatcher::new(&tools);

        let call = ToolCallRequest::new("c1", "weather", serde_json::json!({ "city": "Oslo" }));
        let output = dispatcher.dispatch(&call).await.unwrap();
        assert_eq!(output, r#"weather {"city":"Oslo"}"#);

        let unknown = ToolCallRequest::new("c2", "nope", serde_json::json!({}));
        assert!(dispatcher.dispatch(&unknown).await.is_err());
    }
}
