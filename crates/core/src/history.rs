//! History recording: keeps persisted history in step with what the
//! model actually saw.
//!
//! Middleware that injects synthetic messages into a round reports them
//! through a [`HistoryRecorder`]. [`SessionHistory`] is the in-process
//! implementation the orchestrator drains after every round.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::HistoryError;
use crate::message::Message;

/// Receives synthetic assistant messages produced inside a round.
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record_assistant_message(&self, message: &Message) -> Result<(), HistoryError>;
}

/// An in-memory recorder whose pending messages are drained by the
/// orchestrator and spliced into its transcript.
#[derive(Clone, Default)]
pub struct SessionHistory {
    pending: Arc<Mutex<Vec<Message>>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded since the last call.
    pub async fn take_recorded(&self) -> Vec<Message> {
        std::mem::take(&mut *self.pending.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

#[async_trait]
impl HistoryRecorder for SessionHistory {
    async fn record_assistant_message(&self, message: &Message) -> Result<(), HistoryError> {
        self.pending.lock().await.push(message.clone());
        Ok(())
    }
}
