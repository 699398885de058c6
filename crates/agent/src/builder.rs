//! Assembling an [`Orchestrator`] and its runner chain from configuration.

use std::sync::Arc;

use async_trait::async_trait;
use roundtable_config::RoundtableConfig;
use roundtable_core::backend::CompletionBackend;
use roundtable_core::error::{Error, ToolError};
use roundtable_core::event::EventBus;
use roundtable_core::history::HistoryRecorder;
use roundtable_core::tool::{ToolCallRequest, ToolDescriptor, ToolDispatcher};
use tracing::debug;

use crate::middleware::{
    ModelMatcher, ModelQuirkMiddleware, PlanningMiddleware, PlanningSettings, QuirkSettings,
};
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::runner::{BasicIterationRunner, LoopIterationRunner};

/// Builds the runner chain in a fixed order, outermost first:
/// planning, model quirks, basic runner. Layers are only added when enabled.
pub struct AgentBuilder {
    config: RoundtableConfig,
    backend: Option<Arc<dyn CompletionBackend>>,
    dispatcher: Option<Arc<dyn ToolDispatcher>>,
    tools: Vec<ToolDescriptor>,
    recorder: Option<Arc<dyn HistoryRecorder>>,
    matcher: Option<ModelMatcher>,
    event_bus: Option<Arc<EventBus>>,
}

impl AgentBuilder {
    pub fn new(config: RoundtableConfig) -> Self {
        Self {
            config,
            backend: None,
            dispatcher: None,
            tools: Vec::new(),
            recorder: None,
            matcher: None,
            event_bus: None,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn ToolDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    /// Fallback recorder for planning messages produced outside an
    /// orchestrated session.
    pub fn recorder(mut self, recorder: Arc<dyn HistoryRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Override the quirk predicate built from `model_quirks.models`.
    pub fn model_matcher(mut self, matcher: ModelMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    fn quirk_matcher(&self) -> Option<ModelMatcher> {
        self.matcher.clone().or_else(|| {
            let models = &self.config.model_quirks.models;
            (!models.is_empty()).then(|| ModelMatcher::from_patterns(models))
        })
    }

    /// Compose the runner chain.
    pub fn build_runner(&self) -> Box<dyn LoopIterationRunner> {
        let mut runner: Box<dyn LoopIterationRunner> = Box::new(BasicIterationRunner::new());

        if let Some(matcher) = self.quirk_matcher() {
            debug!("Adding model-quirk middleware");
            runner = Box::new(ModelQuirkMiddleware::new(
                runner,
                matcher,
                QuirkSettings::from_config(&self.config.model_quirks),
            ));
        }

        if self.config.planning.enabled {
            debug!("Adding planning middleware");
            let settings = PlanningSettings::from_config(&self.config.planning);
            let mut planning = PlanningMiddleware::new(runner, settings);
            if let Some(recorder) = &self.recorder {
                planning = planning.with_recorder(recorder.clone());
            }
            runner = Box::new(planning);
        }

        runner
    }

    /// Build the orchestrator. A backend is required; without a dispatcher
    /// every tool call is answered with a not-found error.
    pub fn build(self) -> Result<Orchestrator, Error> {
        self.config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let backend = self.backend.clone().ok_or_else(|| Error::Config {
            message: "no completion backend configured".into(),
        })?;
        let dispatcher: Arc<dyn ToolDispatcher> = match &self.dispatcher {
            Some(dispatcher) => dispatcher.clone(),
            None => Arc::new(NoToolsDispatcher),
        };

        let runner: Arc<dyn LoopIterationRunner> = Arc::from(self.build_runner());
        let settings = OrchestratorSettings::from_config(&self.config).with_tools(self.tools);

        let orchestrator = Orchestrator::new(runner, backend, dispatcher, settings);
        Ok(match self.event_bus {
            Some(bus) => orchestrator.with_event_bus(bus),
            None => orchestrator,
        })
    }
}

struct NoToolsDispatcher;

#[async_trait]
impl ToolDispatcher for NoToolsDispatcher {
    async fn dispatch(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        Err(ToolError::NotFound(call.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{IterationContext, RoundKind};
    use crate::test_helpers::{descriptor, ScriptedBackend};
    use roundtable_core::backend::{CompletionRequest, CompletionResult};
    use roundtable_core::message::Message;
    use roundtable_core::tool::ToolChoice;

    fn planning_backend() -> Arc<ScriptedBackend> {
        Arc::new(ScriptedBackend::new(|request: &CompletionRequest| {
            if request.response_schema.is_some() {
                Ok(CompletionResult::text(r#"{"plan":"p"}"#))
            } else {
                Ok(CompletionResult::text("answer"))
            }
        }))
    }

    #[test]
    fn build_requires_backend() {
        let err = AgentBuilder::new(RoundtableConfig::default()).build().err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = RoundtableConfig::default();
        config.agent.max_iterations = 0;
        let err = AgentBuilder::new(config)
            .backend(planning_backend())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn default_chain_is_basic_runner() {
        let backend = planning_backend();
        let runner = AgentBuilder::new(RoundtableConfig::default()).build_runner();
        runner
            .run_iteration(IterationContext::new(backend.clone(), "m", vec![Message::user("q")]))
            .await
            .unwrap();
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn planning_enabled_adds_planning_call() {
        let mut config = RoundtableConfig::default();
        config.planning.enabled = true;
        let backend = planning_backend();
        let runner = AgentBuilder::new(config).build_runner();
        runner
            .run_iteration(IterationContext::new(backend.clone(), "m", vec![Message::user("q")]))
            .await
            .unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].response_schema.is_some());
        assert_eq!(requests[1].messages.len(), 2);
    }

    #[tokio::test]
    async fn quirk_models_from_config_enable_rewrites() {
        let mut config = RoundtableConfig::default();
        config.model_quirks.models = vec!["quirky".into()];
        config.model_quirks.forced_tool_instruction = "!".into();
        let backend = Arc::new(ScriptedBackend::text("ok"));
        let runner = AgentBuilder::new(config).build_runner();

        let ctx = IterationContext::new(backend.clone(), "quirky-7b", vec![Message::user("q")])
            .with_tools(vec![descriptor("search")])
            .with_round(RoundKind::forced(vec![ToolChoice::new("search")]));
        runner.run_iteration(ctx).await.unwrap();

        assert_eq!(backend.requests()[0].messages[0].text(), "q!");
    }

    #[tokio::test]
    async fn planning_wraps_quirk_layer() {
        let mut config = RoundtableConfig::default();
        config.planning.enabled = true;
        config.model_quirks.models = vec!["quirky".into()];
        config.model_quirks.no_tools_instruction = "stop".into();
        let backend = planning_backend();
        let runner = AgentBuilder::new(config).build_runner();

        let ctx = IterationContext::new(backend.clone(), "quirky-7b", vec![Message::user("q")])
            .with_round(RoundKind::Last);
        runner.run_iteration(ctx).await.unwrap();

        let requests = backend.requests();
        // planning sees the raw messages; the inner call sees plan then stop
        assert_eq!(requests[0].messages.len(), 1);
        let texts: Vec<_> = requests[1].messages.iter().map(|m| m.text()).collect();
        assert_eq!(texts, ["q", r#"{"plan":"p"}"#, "stop"]);
    }

    #[tokio::test]
    async fn built_orchestrator_uses_config() {
        let mut config = RoundtableConfig::default();
        config.agent.model = "configured-model".into();
        config.agent.max_tokens = Some(256);
        let backend = Arc::new(ScriptedBackend::text("hi"));

        let orchestrator = AgentBuilder::new(config)
            .backend(backend.clone())
            .tools(vec![descriptor("search")])
            .build()
            .unwrap();
        orchestrator.run(vec![Message::user("q")], vec![]).await.unwrap();

        let request = &backend.requests()[0];
        assert_eq!(request.model, "configured-model");
        assert_eq!(request.options.max_tokens, Some(256));
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn missing_dispatcher_reports_not_found() {
        let err = NoToolsDispatcher
            .dispatch(&ToolCallRequest::new("c", "search", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "search"));
    }
}
