//! `roundtable replay`: Run a scripted session through the runner chain.

use roundtable_agent::AgentBuilder;
use roundtable_core::event::{EventBus, SessionEvent};
use roundtable_core::tool::ToolChoice;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::load_config;
use crate::script::{EchoDispatcher, Script, ScriptBackend};

pub async fn run(
    config_path: Option<&Path>,
    script_path: &Path,
    force: Vec<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let script = Script::load(script_path)?;

    let messages = script.messages();
    let dispatcher = Arc::new(EchoDispatcher::new(&script.tools));
    let backend = Arc::new(ScriptBackend::new(script.replies));
    let bus = Arc::new(EventBus::default());

    let orchestrator = AgentBuilder::new(config)
        .backend(backend.clone())
        .dispatcher(dispatcher)
        .tools(script.tools)
        .event_bus(bus.clone())
        .build()?;

    let mut events = bus.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.as_ref() {
                SessionEvent::RoundCompleted {
                    iteration,
                    round,
                    tool_calls,
                    ..
                } => info!(
                    iteration = *iteration,
                    round = %round,
                    tool_calls = *tool_calls,
                    "Round completed"
                ),
                SessionEvent::ToolDispatched {
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } => info!(
                    tool = %tool_name,
                    success = *success,
                    duration_ms = *duration_ms,
                    "Tool dispatched"
                ),
                SessionEvent::SessionFinished { .. } => break,
            }
        }
    });

    let forced = force.into_iter().map(ToolChoice::new).collect();
    let outcome = orchestrator.run(messages, forced).await;

    // The bus only closes when every sender is gone.
    drop(orchestrator);
    drop(bus);
    let _ = watcher.await;

    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.transcript)?);
        return Ok(());
    }

    for message in &outcome.transcript {
        let label = message.role;
        let text = message.text();
        if !text.is_empty() {
            println!("[{label}] {text}");
        }
        for call in &message.tool_calls {
            println!("[{label}] -> {}({})", call.name, call.arguments);
        }
    }

    println!();
    println!(
        "{} after {} round(s), {} reference(s)",
        outcome.stop_reason.as_str(),
        outcome.iterations,
        outcome.references.len()
    );
    if backend.remaining() > 0 {
        println!("unused scripted replies: {}", backend.remaining());
    }

    Ok(())
}
