//! # Roundtable Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! roundtable agent orchestration core. This crate carries no control flow:
//! it defines the vocabulary that the runner, middleware and orchestrator
//! in `roundtable-agent` are written against.
//!
//! External collaborators are traits here:
//! - [`CompletionBackend`] reaches the language model
//! - [`ToolDispatcher`] executes tool calls
//! - [`HistoryRecorder`] persists synthetic messages injected mid-round

pub mod backend;
pub mod error;
pub mod event;
pub mod history;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use backend::{
    CompletionBackend, CompletionOptions, CompletionRequest, CompletionResult, Reference,
    ResponseSchema,
};
pub use error::{BackendError, Error, HistoryError, Result, ToolError};
pub use event::{EventBus, SessionEvent};
pub use history::{HistoryRecorder, SessionHistory};
pub use message::{ContentPart, Message, MessageContent, Role};
pub use tool::{ToolCallRequest, ToolChoice, ToolDescriptor, ToolDispatcher};
