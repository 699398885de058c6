//! Runner middleware.
//!
//! Each middleware wraps exactly one inner [`LoopIterationRunner`] and is
//! itself a runner, so layers stack in any order:
//!
//! ```text
//! PlanningMiddleware
//!   └─ ModelQuirkMiddleware
//!        └─ BasicIterationRunner
//! ```
//!
//! Middleware holds only construction-time configuration. Anything
//! round-dependent is derived from the [`IterationContext`] it receives.
//!
//! [`LoopIterationRunner`]: crate::runner::LoopIterationRunner
//! [`IterationContext`]: crate::context::IterationContext

pub mod model_quirk;
pub mod planning;

pub use model_quirk::{ModelMatcher, ModelQuirkMiddleware, QuirkSettings};
pub use planning::{PlanningMiddleware, PlanningSettings};

/// Metadata key set on messages a middleware injects.
pub const SYNTHETIC_KEY: &str = "roundtable.synthetic";
