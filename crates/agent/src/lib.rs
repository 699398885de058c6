//! The roundtable orchestration core.
//!
//! A session is a sequence of rounds against a completion backend:
//!
//! 1. The [`Orchestrator`] decides the round kind (normal, forced-tool, last)
//! 2. The outermost [`LoopIterationRunner`] of the middleware chain runs it
//! 3. Middleware rewrites the round's inputs on the way down
//! 4. [`BasicIterationRunner`] makes the backend call(s) and merges results
//! 5. Tool calls go to the external dispatcher, and the loop repeats
//!
//! The session ends when the model answers without tool calls or the round
//! budget is spent. Independent sessions can be fanned out through the
//! [`ConcurrentTaskExecutor`].

pub mod builder;
pub mod context;
pub mod executor;
pub mod merge;
pub mod middleware;
pub mod orchestrator;
pub mod runner;

pub use builder::AgentBuilder;
pub use context::{IterationContext, RoundKind};
pub use executor::{ConcurrentTaskExecutor, TaskError};
pub use merge::merge_forced_results;
pub use middleware::{
    ModelMatcher, ModelQuirkMiddleware, PlanningMiddleware, PlanningSettings, QuirkSettings,
};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RunOutcome, SessionJob, StopReason};
pub use runner::{BasicIterationRunner, LoopIterationRunner};
pub use roundtable_config::ExecutionMode;

#[cfg(test)]
pub(crate) mod test_helpers;
