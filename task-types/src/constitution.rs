//! Constitution data shapes — the frozen rule set vocabulary.
//!
//! This crate defines the data only; the sealed rule set, default rules,
//! and the three enforcement layers (prompt injection, tool guard, output
//! scan) live in `task-constitution`.

use serde::{Deserialize, Serialize};

/// How serious a rule violation is. Only `Critical` is fatal to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth recording; does not block execution.
    Low,
    /// Worth surfacing to the caller; does not block execution.
    Medium,
    /// Blocks the specific action but not the whole task.
    High,
    /// Aborts the task immediately.
    Critical,
}

/// A `(tool, field, pattern)` triple for matching tool-call arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgPattern {
    /// Tool name this pattern applies to.
    pub tool: String,
    /// Argument field to test. `None` means "serialize the whole argument
    /// bag and test that".
    pub field: Option<String>,
    /// Case-insensitive regex tested against the field's string form.
    pub pattern: String,
}

/// A `(tool, field, max)` triple enforcing a numeric ceiling on an argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgLimit {
    /// Tool name this limit applies to.
    pub tool: String,
    /// Argument field expected to hold a number.
    pub field: String,
    /// Maximum allowed value, inclusive.
    pub max: f64,
}

/// How a rule is enforced: which tools it blocks outright, which argument
/// patterns and limits it checks, and which output patterns it scans for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enforcement {
    /// Tool names this rule blocks unconditionally.
    #[serde(default)]
    pub blocked_tools: Vec<String>,
    /// Argument patterns this rule checks at `PreToolUse`.
    #[serde(default)]
    pub arg_patterns: Vec<ArgPattern>,
    /// Numeric argument ceilings this rule checks at `PreToolUse`.
    #[serde(default)]
    pub arg_limits: Vec<ArgLimit>,
    /// Case-insensitive regexes scanned over synthesized output text.
    #[serde(default)]
    pub output_patterns: Vec<String>,
}

/// One immutable rule in the constitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier (e.g. `"SAFETY-001"`).
    pub id: String,
    /// Short human-readable name.
    pub name: String,
    /// How serious a violation is.
    pub severity: Severity,
    /// Grouping label (e.g. `"destructive-commands"`, `"exfiltration"`).
    pub category: String,
    /// Human-readable description, used verbatim in the prompt-injection block.
    pub description: String,
    /// What this rule actually checks.
    pub enforcement: Enforcement,
}

/// One violation found by a guard check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Which rule was violated.
    pub rule_id: String,
    /// The violated rule's severity, copied through for convenience.
    pub severity: Severity,
    /// Human-readable explanation of the match.
    pub message: String,
}
