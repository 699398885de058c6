//! Session events: observable milestones of an orchestrated session.
//!
//! The orchestrator publishes an event after each round, each tool dispatch,
//! and when the session ends. Subscribers (CLI progress output, tests) react
//! without coupling to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All session events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A round finished and its result was appended to the transcript
    RoundCompleted {
        iteration: usize,
        round: String, // "normal", "last", "forced_tool"
        tool_calls: usize,
        references: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was handed to the dispatcher
    ToolDispatched {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The session terminated
    SessionFinished {
        iterations: usize,
        stop_reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for session events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<SessionEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
