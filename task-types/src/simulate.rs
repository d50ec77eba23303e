//! SimulationResult — the simulator's static, side-effect-free pre-flight check.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a simulation issue was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// The step's tool name isn't registered.
    MissingTool,
    /// The step's arguments fail the tool's input schema.
    InvalidArgs,
    /// A browser-action step has no preceding navigate, or a step
    /// references a forward output it can't have yet.
    MissingDependency,
    /// An irreversible or side-effectful action per the static risk map.
    HighRisk,
}

/// How serious a simulation issue is. `valid = no High issue anywhere`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Informational; the plan is still valid.
    Low,
    /// Worth flagging but not blocking.
    Medium,
    /// Blocks the plan from being marked valid.
    High,
}

/// One issue found while simulating a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationIssue {
    /// Index of the offending step in the plan being simulated.
    pub step_index: usize,
    /// What kind of issue this is.
    #[serde(rename = "type")]
    pub kind: IssueType,
    /// How severe.
    pub severity: IssueSeverity,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome of simulating a plan against a tool registry: whether it's
/// valid, every issue found, and an estimated cost (for budget planning).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// `true` iff no issue has [`IssueSeverity::High`].
    pub valid: bool,
    /// All issues found, in step order.
    pub issues: Vec<SimulationIssue>,
    /// Rough cost estimate for executing the plan as-is.
    pub estimated_cost: Decimal,
}
