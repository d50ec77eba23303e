//! PlanStep and ExecutionPlan — the planner's unit of work and its ordering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of verification runs after a step succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyType {
    /// No post-step verification.
    None,
    /// Check the step's own output against an assertion.
    OutputCheck,
    /// Check the live DOM via a `browser_evaluate` script.
    DomCheck,
}

/// Post-step verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySpec {
    /// Which check to run.
    #[serde(rename = "type")]
    pub kind: VerifyType,
    /// Regex (preferred) or substring to test for.
    pub assertion: String,
    /// Whether to retry the step on verification failure.
    #[serde(default)]
    pub retry_on_fail: bool,
    /// Maximum retries before giving up (default 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    2
}

/// Which automation surface a step prefers, and what to fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Drive the DOM directly (default for browser tools).
    Dom,
    /// Screenshot + visual grounding.
    Vision,
    /// Call a REST/HTTP endpoint instead of driving the UI.
    Api,
}

/// Automation strategy annotation, attached during simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    /// The preferred surface.
    pub primary: StrategyKind,
    /// Ordered fallbacks to try if `primary` fails.
    #[serde(default)]
    pub fallback_chain: Vec<StrategyKind>,
    /// Why this strategy was chosen (for the trace).
    pub reason: String,
}

/// One invocation in an [`ExecutionPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Position within the plan at the time it was produced. Stable even
    /// as steps are inserted/removed during reactive planning and recovery —
    /// it identifies the step, not a live array index.
    pub index: usize,
    /// Human-readable description of what this step does.
    pub description: String,
    /// Name of the tool to invoke, as registered in the tool registry.
    pub tool_name: String,
    /// Arguments passed to the tool, by field name.
    #[serde(default)]
    pub tool_args: BTreeMap<String, serde_json::Value>,
    /// Optional post-execution verification.
    pub verify: Option<VerifySpec>,
    /// Optional automation strategy annotation (set during simulation).
    pub strategy: Option<StrategySpec>,
}

impl PlanStep {
    /// Construct a step with no verification or strategy annotation.
    pub fn new(
        index: usize,
        description: impl Into<String>,
        tool_name: impl Into<String>,
        tool_args: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            index,
            description: description.into(),
            tool_name: tool_name.into(),
            tool_args,
            verify: None,
            strategy: None,
        }
    }
}

/// An ordered sequence of [`PlanStep`]s for one task, with the complexity
/// score that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// The task this plan belongs to.
    pub task_id: String,
    /// Classified complexity in `[0, 1]`.
    pub complexity: f64,
    /// The ordered steps.
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// An empty plan — the "direct answer" case (zero tool steps).
    pub fn empty(task_id: impl Into<String>, complexity: f64) -> Self {
        Self {
            task_id: task_id.into(),
            complexity,
            steps: Vec::new(),
        }
    }

    /// Renumber `index` to match each step's position. Call after any
    /// insertion, removal, or reordering so indices stay contiguous.
    pub fn renumber(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.index = i;
        }
    }
}
