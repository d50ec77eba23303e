//! Per-step confidence estimation for the `act` phase.

use std::collections::HashMap;
use task_types::{PlanStep, StepResult};

/// Map each plan step's index to the confidence the critique stage assigned
/// it, falling back to `overall` for steps the critique's `step_confidences`
/// list didn't reach (a shorter list, or steps inserted after critique ran).
pub(crate) fn confidence_map(steps: &[PlanStep], step_confidences: &[f64], overall: f64) -> HashMap<usize, f64> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| (step.index, step_confidences.get(i).copied().unwrap_or(overall)))
        .collect()
}

/// `base - 0.2*recent_failures - 0.15*known_failure_pattern + 0.1*tool_succeeded_recently`,
/// clamped to `[0.1, 1.0]`. `history` is every step result executed so far,
/// oldest first.
pub(crate) fn estimate(base: f64, tool_name: &str, history: &[StepResult]) -> f64 {
    let recent = &history[history.len().saturating_sub(3)..];
    let recent_failures = recent.iter().filter(|r| !r.success).count() as f64;
    let has_known_failure_pattern = history.iter().any(|r| r.tool_name == tool_name && !r.success);
    let tool_succeeded_recently = recent.iter().any(|r| r.tool_name == tool_name && r.success);

    let confidence = base
        - 0.2 * recent_failures
        - if has_known_failure_pattern { 0.15 } else { 0.0 }
        + if tool_succeeded_recently { 0.1 } else { 0.0 };
    confidence.clamp(0.1, 1.0)
}
