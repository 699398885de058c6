//! Per-round inputs: [`IterationContext`] and the [`RoundKind`] discriminant.

use std::sync::Arc;

use roundtable_core::backend::{CompletionBackend, CompletionOptions};
use roundtable_core::history::HistoryRecorder;
use roundtable_core::message::Message;
use roundtable_core::tool::{ToolChoice, ToolDescriptor};

/// Which strategy a round runs under. Decided once by the orchestrator,
/// never inferred from the rest of the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundKind {
    /// Tools passed through, model decides freely.
    Normal,
    /// Round budget exhausted; tools are withdrawn.
    Last,
    /// One backend call per choice, each constrained to that tool.
    ForcedTool { choices: Vec<ToolChoice> },
}

impl RoundKind {
    /// A forced-tool round, or `Normal` when `choices` is empty.
    pub fn forced(choices: Vec<ToolChoice>) -> Self {
        if choices.is_empty() {
            RoundKind::Normal
        } else {
            RoundKind::ForcedTool { choices }
        }
    }

    pub fn is_last(&self) -> bool {
        matches!(self, RoundKind::Last)
    }

    /// The forced choices, empty unless this is a forced-tool round.
    pub fn forced_tool_choices(&self) -> &[ToolChoice] {
        match self {
            RoundKind::ForcedTool { choices } => choices,
            RoundKind::Normal | RoundKind::Last => &[],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoundKind::Normal => "normal",
            RoundKind::Last => "last",
            RoundKind::ForcedTool { .. } => "forced_tool",
        }
    }
}

/// Everything one round needs.
///
/// Created fresh for every round. `messages` is shared read-only; middleware
/// that needs to change it builds a new list and swaps the `Arc`, so the
/// caller's list is never touched.
#[derive(Clone)]
pub struct IterationContext {
    /// 0-based round number within the session
    pub iteration_index: usize,

    pub round: RoundKind,

    pub messages: Arc<Vec<Message>>,

    /// Opaque model identifier
    pub model: String,

    pub tools: Vec<ToolDescriptor>,

    /// Passed to the backend verbatim
    pub options: CompletionOptions,

    pub backend: Arc<dyn CompletionBackend>,

    /// Session-scoped recorder for synthetic messages. Takes precedence over
    /// any recorder a middleware was built with.
    pub recorder: Option<Arc<dyn HistoryRecorder>>,
}

impl IterationContext {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            iteration_index: 0,
            round: RoundKind::Normal,
            messages: Arc::new(messages),
            model: model.into(),
            tools: Vec::new(),
            options: CompletionOptions::default(),
            backend,
            recorder: None,
        }
    }

    pub fn with_iteration(mut self, index: usize) -> Self {
        self.iteration_index = index;
        self
    }

    pub fn with_round(mut self, round: RoundKind) -> Self {
        self.round = round;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn HistoryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Replace the message list with a new one.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    pub fn is_first(&self) -> bool {
        self.iteration_index == 0
    }
}

impl std::fmt::Debug for IterationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationContext")
            .field("iteration_index", &self.iteration_index)
            .field("round", &self.round)
            .field("messages", &self.messages.len())
            .field("model", &self.model)
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("options", &self.options)
            .field("backend", &self.backend.name())
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedBackend;

    #[test]
    fn forced_with_no_choices_is_normal() {
        assert_eq!(RoundKind::forced(vec![]), RoundKind::Normal);
        let forced = RoundKind::forced(vec![ToolChoice::new("search")]);
        assert_eq!(forced.forced_tool_choices().len(), 1);
        assert_eq!(forced.label(), "forced_tool");
    }

    #[test]
    fn only_forced_rounds_carry_choices() {
        assert!(RoundKind::Normal.forced_tool_choices().is_empty());
        assert!(RoundKind::Last.forced_tool_choices().is_empty());
        assert!(RoundKind::Last.is_last());
    }

    #[test]
    fn with_messages_leaves_original_untouched() {
        let backend = Arc::new(ScriptedBackend::text("ok"));
        let ctx = IterationContext::new(backend, "m", vec![Message::user("a")]);
        let original = ctx.messages.clone();

        let rewritten = ctx.clone().with_messages(vec![Message::user("b")]);
        assert_eq!(original[0].text(), "a");
        assert_eq!(ctx.messages[0].text(), "a");
        assert_eq!(rewritten.messages[0].text(), "b");
    }

    #[test]
    fn debug_output_names_backend() {
        let backend = Arc::new(ScriptedBackend::text("ok"));
        let ctx = IterationContext::new(backend, "m", vec![]);
        let rendered = format!("{ctx:?}");
        assert!(rendered.contains("scripted"));
        assert!(rendered.contains("Normal"));
    }
}
