//! Budget preset vocabulary and read-only snapshots.
//!
//! The live, mutable [`BudgetEnvelope`](https://docs.rs/task-budget) lives in
//! `task-budget` — this crate only defines the preset names, the seven
//! dimensions, and the snapshot shapes that cross protocol boundaries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The five fixed budget presets. Only the relative ordering
/// `minimal < low < medium < high < maximum` is load-bearing — the concrete
/// limits are an implementation choice (see `task-budget::presets`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPreset {
    /// Smallest allocation. Smoke tests, trivial one-shot answers.
    Minimal,
    /// Short, low-risk tasks.
    Low,
    /// The default for most tasks.
    Medium,
    /// Multi-step tasks with tool use and occasional escalation.
    High,
    /// Long-running, high-complexity tasks that may escalate repeatedly.
    Maximum,
}

impl BudgetPreset {
    /// Every preset, in ascending order.
    pub const ALL: [BudgetPreset; 5] = [
        BudgetPreset::Minimal,
        BudgetPreset::Low,
        BudgetPreset::Medium,
        BudgetPreset::High,
        BudgetPreset::Maximum,
    ];
}

impl Default for BudgetPreset {
    fn default() -> Self {
        BudgetPreset::Medium
    }
}

/// The seven budget dimensions tracked by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Total LLM tokens (input + output).
    Tokens,
    /// Cost in USD.
    CostUsd,
    /// Wall-clock latency in milliseconds.
    LatencyMs,
    /// Number of tool invocations.
    ToolCalls,
    /// Number of tier escalations (SLM -> LLM).
    Escalations,
    /// Estimated energy consumption in watt-hours.
    EnergyWh,
    /// Estimated carbon emissions in grams CO2e.
    CarbonGrams,
}

impl Dimension {
    /// Every dimension, in the order they appear in [`BudgetUsage`].
    pub const ALL: [Dimension; 7] = [
        Dimension::Tokens,
        Dimension::CostUsd,
        Dimension::LatencyMs,
        Dimension::ToolCalls,
        Dimension::Escalations,
        Dimension::EnergyWh,
        Dimension::CarbonGrams,
    ];
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dimension::Tokens => "tokens",
            Dimension::CostUsd => "cost",
            Dimension::LatencyMs => "latency",
            Dimension::ToolCalls => "tool_calls",
            Dimension::Escalations => "escalations",
            Dimension::EnergyWh => "energy",
            Dimension::CarbonGrams => "carbon",
        };
        write!(f, "{s}")
    }
}

/// Read-only snapshot of one dimension's allocated/used/remaining values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionUsage {
    /// Amount allocated at envelope creation.
    pub allocated: Decimal,
    /// Amount consumed so far.
    pub used: Decimal,
    /// `allocated - used`, floored at zero.
    pub remaining: Decimal,
}

/// A full seven-dimension usage snapshot, taken at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetUsage {
    /// Tokens dimension.
    pub tokens: DimensionUsage,
    /// Cost dimension (USD).
    pub cost_usd: DimensionUsage,
    /// Latency dimension (ms).
    pub latency_ms: DimensionUsage,
    /// Tool call dimension.
    pub tool_calls: DimensionUsage,
    /// Escalation dimension.
    pub escalations: DimensionUsage,
    /// Energy dimension (Wh).
    pub energy_wh: DimensionUsage,
    /// Carbon dimension (g CO2e).
    pub carbon_grams: DimensionUsage,
    /// Running total of prompt/input tokens across the task.
    pub total_input_tokens: u64,
    /// Running total of completion/output tokens across the task.
    pub total_output_tokens: u64,
    /// Unix epoch milliseconds when the envelope was created.
    pub started_at_ms: u64,
}

/// Energy/carbon subtotal, broken out separately because callers often
/// want it without the full seven-dimension snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyTotals {
    /// Total energy consumed, in watt-hours.
    pub energy_wh: Decimal,
    /// Total estimated carbon emitted, in grams CO2e.
    pub carbon_grams: Decimal,
}
