//! PlanScore — the critique stage's judgment of a plan.

use crate::plan::ExecutionPlan;
use serde::{Deserialize, Serialize};

/// The critic's verdict on a plan: an overall confidence, per-step
/// confidences, any issues spotted, and an optional improved plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanScore {
    /// Overall confidence in `[0, 1]`.
    pub overall: f64,
    /// Per-step confidence, same length and order as the plan's steps.
    pub step_confidences: Vec<f64>,
    /// Free-text issues the critic noticed.
    #[serde(default)]
    pub issues: Vec<String>,
    /// A replacement plan the critic proposes, if it thinks the original
    /// is salvageable but flawed.
    pub refined_plan: Option<ExecutionPlan>,
}

impl PlanScore {
    /// Clamp all numeric fields into their valid ranges. Model output is
    /// untrusted — clamp rather than reject so a slightly-out-of-range
    /// score doesn't throw away an otherwise-useful critique.
    pub fn clamped(mut self) -> Self {
        self.overall = self.overall.clamp(0.0, 1.0);
        for c in &mut self.step_confidences {
            *c = c.clamp(0.0, 1.0);
        }
        self
    }

    /// Neutral fallback used when the critic's response can't be parsed.
    pub fn neutral_fallback(step_count: usize) -> Self {
        Self {
            overall: 0.7,
            step_confidences: vec![0.7; step_count],
            issues: Vec::new(),
            refined_plan: None,
        }
    }
}
