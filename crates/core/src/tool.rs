//! Tool descriptors, tool-choice constraints, and tool-call requests.
//!
//! Tool bodies are not executed here. The orchestrator hands every
//! [`ToolCallRequest`] to an external [`ToolDispatcher`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A constraint forcing the model to call one specific tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolChoice {
    /// Name of the tool the model must call
    pub name: String,
}

impl ToolChoice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A tool invocation requested by the model.
///
/// Created by the completion backend; owned afterwards by the orchestrator,
/// which routes it to a [`ToolDispatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique call ID (echoed back in the tool result message)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Executes tool calls on behalf of the orchestrator.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Run one tool call and return its textual output.
    async fn dispatch(&self, call: &ToolCallRequest) -> std::result::Result<String, ToolError>;
}
