//! Prompt rewriting for models that need explicit tool-call formatting.
//!
//! For matching models:
//! - on a forced first round, the latest user message gets an instruction
//!   appended to its text
//! - on the last round, an assistant message telling the model to stop
//!   calling tools is appended
//!
//! Both rewrites produce a new message list; the caller's list is shared
//! read-only and never changes.

use async_trait::async_trait;
use roundtable_core::backend::CompletionResult;
use roundtable_core::error::BackendError;
use roundtable_core::message::{Message, MessageContent, Role};
use std::sync::Arc;
use tracing::debug;

use super::SYNTHETIC_KEY;
use crate::context::IterationContext;
use crate::runner::LoopIterationRunner;

/// Decides whether a model id needs the quirk rewrites.
#[derive(Clone)]
pub struct ModelMatcher {
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl ModelMatcher {
    pub fn from_fn(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Case-insensitive substring match against any of `patterns`.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self::from_fn(move |model| {
            let model = model.to_lowercase();
            patterns.iter().any(|p| model.contains(p.as_str()))
        })
    }

    pub fn matches(&self, model: &str) -> bool {
        (self.predicate)(model)
    }
}

impl std::fmt::Debug for ModelMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelMatcher").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuirkSettings {
    /// Appended to the latest user message on a forced first round
    pub forced_tool_instruction: String,
    /// Content of the assistant message added on the last round
    pub no_tools_instruction: String,
}

impl QuirkSettings {
    pub fn from_config(config: &roundtable_config::ModelQuirksConfig) -> Self {
        Self {
            forced_tool_instruction: config.forced_tool_instruction.clone(),
            no_tools_instruction: config.no_tools_instruction.clone(),
        }
    }
}

impl Default for QuirkSettings {
    fn default() -> Self {
        Self::from_config(&roundtable_config::ModelQuirksConfig::default())
    }
}

pub struct ModelQuirkMiddleware {
    inner: Box<dyn LoopIterationRunner>,
    matcher: ModelMatcher,
    settings: QuirkSettings,
}

impl ModelQuirkMiddleware {
    pub fn new(
        inner: Box<dyn LoopIterationRunner>,
        matcher: ModelMatcher,
        settings: QuirkSettings,
    ) -> Self {
        Self {
            inner,
            matcher,
            settings,
        }
    }
}

/// Copy `messages`, appending `suffix` to the most recent user message.
///
/// Only the first user message found scanning backward is considered; if
/// its content is not plain text it is left as is.
pub fn append_to_last_user_message(messages: &[Message], suffix: &str) -> Vec<Message> {
    let mut rewritten = messages.to_vec();
    if let Some(last_user) = rewritten.iter_mut().rev().find(|m| m.role == Role::User) {
        if let MessageContent::Text(text) = &mut last_user.content {
            text.push_str(suffix);
        }
    }
    rewritten
}

#[async_trait]
impl LoopIterationRunner for ModelQuirkMiddleware {
    async fn run_iteration(
        &self,
        mut ctx: IterationContext,
    ) -> Result<CompletionResult, BackendError> {
        if !self.matcher.matches(&ctx.model) {
            return self.inner.run_iteration(ctx).await;
        }

        if ctx.is_first() && !ctx.round.forced_tool_choices().is_empty() {
            debug!(model = %ctx.model, "Appending forced-tool instruction");
            let messages =
                append_to_last_user_message(&ctx.messages, &self.settings.forced_tool_instruction);
            ctx = ctx.with_messages(messages);
        }

        if ctx.round.is_last() {
            debug!(model = %ctx.model, "Appending no-tools instruction");
            let mut messages = ctx.messages.as_ref().clone();
            messages.push(
                Message::assistant(self.settings.no_tools_instruction.as_str()).with_metadata(
                    SYNTHETIC_KEY,
                    serde_json::Value::String("no_tools".into()),
                ),
            );
            ctx = ctx.with_messages(messages);
        }

        self.inner.run_iteration(ctx).await
    }
}
