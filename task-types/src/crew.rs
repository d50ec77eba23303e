//! CrewDefinition — composing multiple agents under a strategy.

use crate::agent::AgentDefinition;
use crate::budget::BudgetPreset;
use serde::{Deserialize, Serialize};

/// How a crew's agents are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewStrategy {
    /// Agents run one after another in `agent_order` (or declaration order).
    Sequential,
    /// All agents run concurrently.
    Parallel,
    /// First agent delegates to the rest, then synthesizes their outputs.
    Hierarchical,
    /// Agents form a DAG; layers run in topological order.
    Graph,
}

/// How per-agent results are combined into the crew's final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Join every agent's labelled result.
    Concat,
    /// Return only the last agent's result.
    Last,
    /// Route to a model with `aggregation_prompt`; falls back to `Concat`.
    Custom,
}

/// One directed edge in a [`CrewStrategy::Graph`] crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source agent id.
    pub from: String,
    /// Destination agent id.
    pub to: String,
    /// Optional condition string, restricted to the three safe patterns
    /// described in `task-crew::graph`. `None` means "always traverse".
    pub condition: Option<String>,
}

/// A named composition of agents, a strategy, and a budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewDefinition {
    /// Crew name, for logging and trace labelling.
    pub name: String,
    /// The member agents.
    pub agents: Vec<AgentDefinition>,
    /// How the agents compose.
    pub strategy: CrewStrategy,
    /// Edges for `Graph` strategy. Empty/ignored for other strategies.
    #[serde(default)]
    pub graph: Vec<GraphEdge>,
    /// How to combine agent outputs into one result.
    pub aggregation: AggregationMode,
    /// Prompt used when `aggregation` is `Custom`.
    pub aggregation_prompt: Option<String>,
    /// Budget preset for the crew's top-level envelope.
    pub budget_preset: BudgetPreset,
    /// Explicit run order for `Sequential` strategy. Falls back to
    /// declaration order when `None`.
    pub agent_order: Option<Vec<String>>,
}

/// Aggregate status of a crew run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrewStatus {
    /// Every agent completed.
    Completed,
    /// Some agents failed but the crew still produced an aggregated result.
    Partial,
    /// The crew could not run at all (e.g. a graph cycle).
    Failed,
}

/// One agent's contribution to a crew run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    /// Which agent produced this.
    pub agent_id: String,
    /// The agent's own task result (status, text, steps, budget used).
    pub task_result: crate::result::TaskResult,
}

/// The aggregate result of running a [`CrewDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewResult {
    /// Crew name, copied through for convenience.
    pub name: String,
    /// Every agent's individual result, in start order.
    pub agent_results: Vec<AgentRunResult>,
    /// The combined final text.
    pub aggregated_result: String,
    /// Aggregate status.
    pub status: CrewStatus,
    /// Set when `status` is `Failed`.
    pub error: Option<String>,
}
