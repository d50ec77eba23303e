//! Error kinds observable at the core boundary.

use crate::budget::Dimension;
use crate::constitution::Severity;
use thiserror::Error;

/// Top-level errors the task executor's state machine can encounter.
/// Every variant is recovered by `execute()` and converted into a
/// [`crate::result::TaskResult`] — none of these should ever panic a caller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TaskError {
    /// A budget dimension reached zero. Recovered at the top executor
    /// boundary into status `budget_exhausted` with a partial result.
    #[error("budget exhausted: {0}")]
    BudgetExhausted(Dimension),

    /// A constitution rule was violated. `Critical` is fatal and bubbles
    /// out of tool invocation immediately; lower severities are recorded
    /// and the offending action is skipped.
    #[error("constitution violation {rule_id} ({severity:?})")]
    ConstitutionViolation {
        /// The violated rule's id.
        rule_id: String,
        /// The violated rule's severity.
        severity: Severity,
    },

    /// A plan referenced a tool or shape the registry rejects. Absorbed by
    /// the executor — the simulator downstream filters the bad steps.
    #[error("plan validation failed: {0}")]
    PlanValidation(String),

    /// Tool execution failed. Captured as `{success: false, error}` inside
    /// a `StepResult` — this variant never crosses the invoke boundary,
    /// it exists for call sites that need to propagate it further.
    #[error("tool error in {tool}: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Error message.
        message: String,
    },

    /// The underlying model/provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Catch-all for anything else.
    #[error("{0}")]
    Other(String),
}
