//! The Task entity — a natural-language description plus a budget preset.

use crate::budget::BudgetPreset;
use crate::id::SessionId;
use serde::{Deserialize, Serialize};

/// One prior turn of conversation, carried into the task so the planner
/// and synthesizer have context beyond the current description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who said it.
    pub role: ChatRole,
    /// What they said.
    pub content: String,
}

/// Speaker role for a prior chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The end user.
    User,
    /// A prior assistant response.
    Assistant,
    /// A system-level instruction.
    System,
}

/// A task entering the execution core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned or generated task identifier.
    pub id: String,
    /// The natural-language instruction to execute.
    pub description: String,
    /// Prior conversation turns, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Which of the five fixed resource envelopes to allocate.
    #[serde(default)]
    pub budget_preset: BudgetPreset,
    /// Session this task belongs to, for conversation continuity.
    pub session_id: Option<SessionId>,
    /// Unix epoch milliseconds when the task was submitted.
    pub created_at: u64,
}

impl Task {
    /// Build a task with only the required fields set.
    pub fn new(id: impl Into<String>, description: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            messages: Vec::new(),
            budget_preset: BudgetPreset::default(),
            session_id: None,
            created_at,
        }
    }

    /// Builder-style setter for the budget preset.
    pub fn with_budget(mut self, preset: BudgetPreset) -> Self {
        self.budget_preset = preset;
        self
    }
}
