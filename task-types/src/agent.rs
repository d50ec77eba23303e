//! AgentDefinition — one member of a crew.

use serde::{Deserialize, Serialize};

/// How an agent executes its work within a crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// A tight tool-use loop of 1-3 model calls, no full planning pipeline.
    Direct,
    /// The full seven-phase task executor pipeline (spec/plan/critique/...).
    Full,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Direct
    }
}

/// One agent's role, instructions, and execution parameters within a crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique id within the crew.
    pub id: String,
    /// Short role label (e.g. `"researcher"`, `"writer"`).
    pub role: String,
    /// System-prompt-level instructions for this agent.
    pub instructions: String,
    /// Explicit fraction of the crew's budget this agent gets. `None`
    /// means "split the remainder evenly with other agents lacking a share".
    pub budget_share: Option<f64>,
    /// Direct vs. full pipeline execution.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Retries on output-schema validation failure (crew default: 2).
    pub max_retries: Option<u32>,
    /// Required top-level keys the agent's output must contain.
    pub output_schema: Option<serde_json::Value>,
    /// Tool names this agent may use. `None` means "every tool in the
    /// crew's registry".
    pub allowed_tools: Option<Vec<String>>,
}
