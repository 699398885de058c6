//! The [`LoopIterationRunner`] contract and its default implementation.

use async_trait::async_trait;
use futures::future::try_join_all;
use roundtable_core::backend::{CompletionRequest, CompletionResult};
use roundtable_core::error::BackendError;
use roundtable_core::tool::{ToolChoice, ToolDescriptor};
use tracing::debug;

use crate::context::{IterationContext, RoundKind};
use crate::merge::merge_forced_results;

/// Runs one round of a tool-use session.
///
/// Implementations must be safe to call concurrently and must not mutate
/// anything beyond the returned value. A failed backend call surfaces as a
/// [`BackendError`] and is not retried here.
#[async_trait]
pub trait LoopIterationRunner: Send + Sync {
    async fn run_iteration(&self, ctx: IterationContext) -> Result<CompletionResult, BackendError>;
}

#[async_trait]
impl<R: LoopIterationRunner + ?Sized> LoopIterationRunner for Box<R> {
    async fn run_iteration(&self, ctx: IterationContext) -> Result<CompletionResult, BackendError> {
        (**self).run_iteration(ctx).await
    }
}

#[async_trait]
impl<R: LoopIterationRunner + ?Sized> LoopIterationRunner for std::sync::Arc<R> {
    async fn run_iteration(&self, ctx: IterationContext) -> Result<CompletionResult, BackendError> {
        (**self).run_iteration(ctx).await
    }
}

/// The innermost runner: picks the round strategy from [`RoundKind`] and
/// talks to the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicIterationRunner;

impl BasicIterationRunner {
    pub fn new() -> Self {
        Self
    }

    fn request(
        ctx: &IterationContext,
        tools: Vec<ToolDescriptor>,
        tool_choice: Option<ToolChoice>,
    ) -> CompletionRequest {
        CompletionRequest {
            model: ctx.model.clone(),
            messages: ctx.messages.as_ref().clone(),
            tools,
            tool_choice,
            response_schema: None,
            options: ctx.options.clone(),
        }
    }

    async fn run_normal(ctx: &IterationContext) -> Result<CompletionResult, BackendError> {
        let request = Self::request(ctx, ctx.tools.clone(), None);
        ctx.backend.complete(request).await
    }

    async fn run_last(ctx: &IterationContext) -> Result<CompletionResult, BackendError> {
        // tools withdrawn no matter what the context carries
        let request = Self::request(ctx, Vec::new(), None);
        ctx.backend.complete(request).await
    }

    async fn run_forced(
        ctx: &IterationContext,
        choices: &[ToolChoice],
    ) -> Result<CompletionResult, BackendError> {
        let calls = choices.iter().map(|choice| {
            let tools = narrow_tools(&ctx.tools, choice);
            let request = Self::request(ctx, tools, Some(choice.clone()));
            let backend = ctx.backend.clone();
            let tool = choice.name.clone();
            async move {
                debug!(tool = %tool, "Forced-tool call");
                backend.complete(request).await
            }
        });

        // try_join_all yields results in input order and fails the round on
        // the first error
        let results = try_join_all(calls).await?;

        merge_forced_results(results).ok_or_else(|| {
            BackendError::MalformedResponse("forced-tool round produced no results".into())
        })
    }
}

/// Restrict the visible tools to the forced one, if it is known.
fn narrow_tools(tools: &[ToolDescriptor], choice: &ToolChoice) -> Vec<ToolDescriptor> {
    match tools.iter().find(|t| t.name == choice.name) {
        Some(tool) => vec![tool.clone()],
        None => tools.to_vec(),
    }
}

#[async_trait]
impl LoopIterationRunner for BasicIterationRunner {
    async fn run_iteration(&self, ctx: IterationContext) -> Result<CompletionResult, BackendError> {
        debug!(
            iteration = ctx.iteration_index,
            round = ctx.round.label(),
            model = %ctx.model,
            messages = ctx.messages.len(),
            tools = ctx.tools.len(),
            "Running round"
        );

        match &ctx.round {
            RoundKind::Normal => Self::run_normal(&ctx).await,
            RoundKind::Last => Self::run_last(&ctx).await,
            RoundKind::ForcedTool { choices } if choices.is_empty() => {
                Self::run_normal(&ctx).await
            }
            RoundKind::ForcedTool { choices } => Self::run_forced(&ctx, choices).await,
        }
    }
}
