//! The session loop: run rounds until the model stops calling tools or the
//! round budget is spent.
//!
//! Each round:
//! 1. **Pick** the round kind (forced on round 0 if asked, last at the budget)
//! 2. **Run** the outermost runner of the middleware chain
//! 3. **Append** recorded synthetic messages, then the assistant message
//! 4. **Dispatch** each requested tool call and append its result

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use roundtable_config::{ExecutorConfig, RoundtableConfig};
use roundtable_core::backend::{CompletionBackend, CompletionOptions, CompletionResult, Reference};
use roundtable_core::error::Error;
use roundtable_core::event::{EventBus, SessionEvent};
use roundtable_core::history::SessionHistory;
use roundtable_core::message::Message;
use roundtable_core::tool::{ToolCallRequest, ToolChoice, ToolDescriptor, ToolDispatcher};
use tracing::{debug, info, warn};

use crate::context::{IterationContext, RoundKind};
use crate::executor::{ConcurrentTaskExecutor, TaskError};
use crate::runner::LoopIterationRunner;

/// Session-wide inputs fixed at agent-build time.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub tools: Vec<ToolDescriptor>,
    pub options: CompletionOptions,
    /// Round budget; the final round runs with tools withdrawn
    pub max_iterations: usize,
    /// How [`Orchestrator::run_batch`] schedules sessions
    pub executor: ExecutorConfig,
}

impl OrchestratorSettings {
    pub fn from_config(config: &RoundtableConfig) -> Self {
        Self {
            model: config.agent.model.clone(),
            tools: Vec::new(),
            options: CompletionOptions {
                temperature: Some(config.agent.temperature),
                max_tokens: config.agent.max_tokens,
                ..CompletionOptions::default()
            },
            max_iterations: config.agent.max_iterations,
            executor: config.executor.clone(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without calling tools.
    Completed,
    /// The round budget ran out; the answer came from the tool-less last round.
    MaxIterations,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::MaxIterations => "max_iterations",
        }
    }
}

/// The result of a whole session.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Input messages followed by everything the session appended
    pub transcript: Vec<Message>,
    /// The assistant message of the final round
    pub final_message: Message,
    /// Citations from every round, in round order
    pub references: Vec<Reference>,
    /// Rounds run
    pub iterations: usize,
    pub stop_reason: StopReason,
}

/// One independent session for [`Orchestrator::run_batch`].
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub messages: Vec<Message>,
    pub forced_tool_choices: Vec<ToolChoice>,
}

impl SessionJob {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            forced_tool_choices: Vec::new(),
        }
    }

    pub fn with_forced(mut self, choices: Vec<ToolChoice>) -> Self {
        self.forced_tool_choices = choices;
        self
    }
}

/// Drives the runner chain round by round.
///
/// Cheap to clone; clones share the runner chain, backend and dispatcher.
#[derive(Clone)]
pub struct Orchestrator {
    runner: Arc<dyn LoopIterationRunner>,
    backend: Arc<dyn CompletionBackend>,
    dispatcher: Arc<dyn ToolDispatcher>,
    settings: Arc<OrchestratorSettings>,
    event_bus: Option<Arc<EventBus>>,
}

impl Orchestrator {
    pub fn new(
        runner: Arc<dyn LoopIterationRunner>,
        backend: Arc<dyn CompletionBackend>,
        dispatcher: Arc<dyn ToolDispatcher>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            runner,
            backend,
            dispatcher,
            settings: Arc::new(settings),
            event_bus: None,
        }
    }

    /// Publish session events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn max_iterations(&self) -> usize {
        self.settings.max_iterations.max(1)
    }

    /// The kind of round `iteration` runs as.
    pub fn round_kind(&self, iteration: usize, forced: &[ToolChoice]) -> RoundKind {
        if iteration + 1 >= self.max_iterations() {
            RoundKind::Last
        } else if iteration == 0 {
            RoundKind::forced(forced.to_vec())
        } else {
            RoundKind::Normal
        }
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run one session to completion.
    ///
    /// `forced` constrains the first round only. A failed round aborts the
    /// session with [`Error::Backend`]; failed tool dispatches do not.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        forced: Vec<ToolChoice>,
    ) -> Result<RunOutcome, Error> {
        info!(
            model = %self.settings.model,
            max_iterations = self.max_iterations(),
            forced = forced.len(),
            messages = messages.len(),
            "Starting session"
        );

        let history = SessionHistory::new();
        let mut transcript = messages;
        let mut references = Vec::new();
        let mut iteration = 0;

        loop {
            let round = self.round_kind(iteration, &forced);
            let label = round.label();
            let is_last = round.is_last();

            let ctx = IterationContext {
                iteration_index: iteration,
                round,
                messages: Arc::new(transcript.clone()),
                model: self.settings.model.clone(),
                tools: self.settings.tools.clone(),
                options: self.settings.options.clone(),
                backend: self.backend.clone(),
                recorder: Some(Arc::new(history.clone())),
            };

            let CompletionResult {
                mut message,
                tool_calls,
                references: round_references,
            } = self.runner.run_iteration(ctx).await?;
            iteration += 1;

            transcript.extend(history.take_recorded().await);

            debug!(
                iteration,
                round = label,
                tool_calls = tool_calls.len(),
                references = round_references.len(),
                "Round completed"
            );
            self.publish(SessionEvent::RoundCompleted {
                iteration,
                round: label.to_string(),
                tool_calls: tool_calls.len(),
                references: round_references.len(),
                timestamp: Utc::now(),
            });

            references.extend(round_references);
            message.tool_calls = tool_calls.clone();
            transcript.push(message.clone());

            if tool_calls.is_empty() || is_last {
                let stop_reason = if is_last {
                    StopReason::MaxIterations
                } else {
                    StopReason::Completed
                };

                if is_last {
                    warn!(iterations = iteration, "Round budget reached, ending session");
                    if !tool_calls.is_empty() {
                        warn!(
                            tool_calls = tool_calls.len(),
                            "Tool calls on the last round are not dispatched"
                        );
                    }
                }

                info!(
                    iterations = iteration,
                    stop_reason = stop_reason.as_str(),
                    "Session finished"
                );
                self.publish(SessionEvent::SessionFinished {
                    iterations: iteration,
                    stop_reason: stop_reason.as_str().to_string(),
                    timestamp: Utc::now(),
                });

                return Ok(RunOutcome {
                    transcript,
                    final_message: message,
                    references,
                    iterations: iteration,
                    stop_reason,
                });
            }

            self.dispatch_all(&tool_calls, &mut transcript).await;
        }
    }

    /// Dispatch tool calls in order, appending one tool message per call.
    async fn dispatch_all(&self, calls: &[ToolCallRequest], transcript: &mut Vec<Message>) {
        for call in calls {
            let start = Instant::now();
            let result = self.dispatcher.dispatch(call).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (content, success) = match result {
                Ok(output) => (output, true),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool dispatch failed");
                    (format!("Error: {e}"), false)
                }
            };

            self.publish(SessionEvent::ToolDispatched {
                tool_name: call.name.clone(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
            transcript.push(Message::tool_result(&call.id, content));
        }
    }

    /// Run independent sessions through a [`ConcurrentTaskExecutor`].
    ///
    /// Results come back in job order; a failed session occupies its own
    /// slot and never affects the others.
    pub async fn run_batch(
        &self,
        jobs: Vec<SessionJob>,
    ) -> Vec<Result<RunOutcome, TaskError<Error>>> {
        let mut executor = ConcurrentTaskExecutor::from_config(&self.settings.executor);
        for job in jobs {
            let this = self.clone();
            executor.add(move || async move {
                this.run(job.messages, job.forced_tool_choices).await
            });
        }
        executor.run().await
    }
}
