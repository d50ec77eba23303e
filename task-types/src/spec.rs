//! TaskSpec — the planner's extraction of goal, constraints, and success criteria.

use serde::{Deserialize, Serialize};

/// What kind of check a success criterion performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    /// The synthesized answer text must contain (or match) something.
    OutputContains,
    /// A named tool (or any tool) must have succeeded.
    ToolSucceeded,
    /// A browser page's url/title must contain something.
    PageState,
    /// A file path must have been written or read.
    FileExists,
    /// Optimistic: met if any step succeeded.
    Custom,
}

/// One success criterion extracted from the task description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessCriterion {
    /// Human-readable description of what "done" looks like.
    pub description: String,
    /// Which check function evaluates this criterion.
    #[serde(rename = "type")]
    pub kind: CriterionType,
    /// Type-specific parameter bag (e.g. `{"pattern": "..."}`, `{"tool": "file_write"}`).
    #[serde(default)]
    pub check: serde_json::Value,
}

impl SuccessCriterion {
    /// The safe fallback criterion used when specification fails or the
    /// model produces nothing usable: "did anything succeed at all".
    pub fn fallback() -> Self {
        Self {
            description: "Task completed successfully".to_string(),
            kind: CriterionType::ToolSucceeded,
            check: serde_json::json!({}),
        }
    }
}

/// The planner's structured understanding of a task: one goal sentence,
/// ordered constraints, and ordered success criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// One-sentence restatement of what the task is trying to achieve.
    pub goal: String,
    /// Ordered constraints the plan must respect.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Ordered success criteria evaluated after synthesis.
    #[serde(default)]
    pub success_criteria: Vec<SuccessCriterion>,
}

impl TaskSpec {
    /// Safe fallback used when `specifyTask` cannot parse a model response.
    /// Must never fail the task — this is the floor.
    pub fn fallback(description: &str) -> Self {
        Self {
            goal: description.to_string(),
            constraints: Vec::new(),
            success_criteria: vec![SuccessCriterion::fallback()],
        }
    }
}
