//! Planning middleware: ask the model for a plan before every round.
//!
//! The plan is requested as structured output with a single free-text
//! field, rendered back to JSON text, and appended to the round's messages
//! as an assistant message. Planning failures never fail the round.

use async_trait::async_trait;
use roundtable_core::backend::{CompletionRequest, CompletionResult, ResponseSchema};
use roundtable_core::error::BackendError;
use roundtable_core::history::HistoryRecorder;
use roundtable_core::message::Message;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::SYNTHETIC_KEY;
use crate::context::IterationContext;
use crate::runner::LoopIterationRunner;

/// Shape of the planning output.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningSettings {
    /// Schema name sent with the structured-output constraint
    pub schema_name: String,
    /// The single free-text field
    pub field: String,
    /// Field description shown to the model
    pub description: String,
}

impl PlanningSettings {
    pub fn new(
        schema_name: impl Into<String>,
        field: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            field: field.into(),
            description: description.into(),
        }
    }

    pub fn from_config(config: &roundtable_config::PlanningConfig) -> Self {
        Self::new(&config.schema_name, &config.field, &config.description)
    }

    pub fn response_schema(&self) -> ResponseSchema {
        ResponseSchema {
            name: self.schema_name.clone(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    self.field.as_str(): {
                        "type": "string",
                        "description": self.description,
                    }
                },
                "required": [self.field],
                "additionalProperties": false,
            }),
        }
    }
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self::from_config(&roundtable_config::PlanningConfig::default())
    }
}

#[derive(Debug, Error)]
enum PlanningError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("planning output is not JSON: {0}")]
    Unparseable(#[from] serde_json::Error),

    #[error("planning output has no string field '{0}'")]
    MissingField(String),
}

pub struct PlanningMiddleware {
    inner: Box<dyn LoopIterationRunner>,
    settings: PlanningSettings,
    recorder: Option<Arc<dyn HistoryRecorder>>,
}

impl PlanningMiddleware {
    pub fn new(inner: Box<dyn LoopIterationRunner>, settings: PlanningSettings) -> Self {
        Self {
            inner,
            settings,
            recorder: None,
        }
    }

    /// Report planning messages to `recorder` when the round's context
    /// carries none of its own.
    pub fn with_recorder(mut self, recorder: Arc<dyn HistoryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    async fn plan(&self, ctx: &IterationContext) -> Result<Message, PlanningError> {
        let request = CompletionRequest {
            model: ctx.model.clone(),
            messages: ctx.messages.as_ref().clone(),
            tools: Vec::new(),
            tool_choice: None,
            response_schema: Some(self.settings.response_schema()),
            options: ctx.options.clone(),
        };

        let result = ctx.backend.complete(request).await?;
        let text = self.render(&result)?;

        Ok(Message::assistant(text)
            .with_metadata(SYNTHETIC_KEY, serde_json::Value::String("planning".into())))
    }

    /// Parse the structured output and serialize it back to text.
    fn render(&self, result: &CompletionResult) -> Result<String, PlanningError> {
        let parsed: serde_json::Value = serde_json::from_str(result.message.text().trim())?;
        let plan = parsed
            .get(&self.settings.field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| PlanningError::MissingField(self.settings.field.clone()))?;

        let mut output = serde_json::Map::new();
        output.insert(
            self.settings.field.clone(),
            serde_json::Value::String(plan.to_string()),
        );
        Ok(serde_json::to_string(&output)?)
    }

    async fn record(&self, ctx: &IterationContext, message: &Message) {
        let Some(recorder) = ctx.recorder.as_ref().or(self.recorder.as_ref()) else {
            return;
        };
        if let Err(e) = recorder.record_assistant_message(message).await {
            warn!(error = %e, "Failed to record planning message");
        }
    }
}

#[async_trait]
impl LoopIterationRunner for PlanningMiddleware {
    async fn run_iteration(
        &self,
        mut ctx: IterationContext,
    ) -> Result<CompletionResult, BackendError> {
        match self.plan(&ctx).await {
            Ok(message) => {
                debug!(iteration = ctx.iteration_index, "Planning message injected");
                self.record(&ctx, &message).await;
                let mut messages = ctx.messages.as_ref().clone();
                messages.push(message);
                ctx = ctx.with_messages(messages);
            }
            Err(e) => {
                warn!(
                    iteration = ctx.iteration_index,
                    error = %e,
                    "Planning failed, continuing without a plan"
                );
            }
        }

        self.inner.run_iteration(ctx).await
    }
}
