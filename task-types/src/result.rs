//! TaskResult — the terminal record produced by the executor for one task.

use crate::budget::BudgetUsage;
use crate::simulate::SimulationResult;
use crate::spec::TaskSpec;
use crate::step_result::StepResult;
use crate::trace::Trace;
use serde::{Deserialize, Serialize};

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Synthesis produced a final answer and every required step ran.
    Completed,
    /// An unrecoverable error occurred (constitution violation, panic, etc.).
    Failed,
    /// A budget dimension hit zero before the task could complete.
    BudgetExhausted,
    /// The task is still running (used for streaming/polling responses).
    Pending,
}

/// Outcome of evaluating one [`crate::spec::SuccessCriterion`] after synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionResult {
    /// The criterion's own description, copied through for convenience.
    pub description: String,
    /// Whether the criterion was judged met.
    pub met: bool,
    /// Why, for debugging/audit.
    pub explanation: String,
}

/// Post-hoc efficiency summary: how much of the allocated budget was
/// actually needed versus how much was spent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyReport {
    /// Steps executed divided by steps planned (can exceed 1.0 with
    /// reactive/recovery insertions).
    pub steps_ratio: f64,
    /// Fraction of the allocated token budget consumed.
    pub token_utilization: f64,
    /// Fraction of the allocated cost budget consumed.
    pub cost_utilization: f64,
    /// Number of escalations consumed.
    pub escalations_used: u64,
    /// Number of replans triggered.
    pub replans: u32,
}

/// The full terminal record for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Result identifier (may differ from `task_id` for retried tasks).
    pub id: String,
    /// The task this result belongs to.
    pub task_id: String,
    /// The trace id recorded alongside this result.
    pub trace_id: String,
    /// Terminal status.
    pub status: TaskStatus,
    /// Synthesized answer text, if synthesis ran.
    pub result: Option<String>,
    /// Every step executed, in execution order (including injected
    /// reactive/recovery/retry steps).
    pub step_results: Vec<StepResult>,
    /// Final budget snapshot.
    pub budget_usage: BudgetUsage,
    /// The full hierarchical trace.
    pub trace: Trace,
    /// The extracted task spec, if specification ran.
    pub spec: Option<TaskSpec>,
    /// Success criteria evaluation results.
    #[serde(default)]
    pub criteria_results: Vec<CriterionResult>,
    /// The simulator's verdict on the (possibly critiqued) plan.
    pub simulation_result: Option<SimulationResult>,
    /// Post-hoc efficiency summary.
    pub efficiency_report: Option<EfficiencyReport>,
    /// Human-readable error, set when `status` is `Failed` or `BudgetExhausted`.
    pub error: Option<String>,
    /// Unix epoch milliseconds when the task reached a terminal state.
    pub completed_at: u64,
}
