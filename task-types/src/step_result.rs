//! StepResult — the outcome of executing one PlanStep.

use crate::duration::DurationMs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The recorded outcome of invoking one tool as part of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Which plan step this result belongs to.
    pub step_index: usize,
    /// The tool that was invoked.
    pub tool_name: String,
    /// The arguments it was invoked with.
    #[serde(default)]
    pub tool_args: BTreeMap<String, serde_json::Value>,
    /// Arbitrary output returned by the tool.
    pub output: serde_json::Value,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Wall-clock duration of the invocation.
    pub duration_ms: DurationMs,
    /// Error message, if `success` is `false`.
    pub error: Option<String>,
    /// The executor's confidence estimate at the time this step ran.
    pub confidence: Option<f64>,
}

impl StepResult {
    /// Construct a successful result.
    pub fn success(
        step_index: usize,
        tool_name: impl Into<String>,
        tool_args: BTreeMap<String, serde_json::Value>,
        output: serde_json::Value,
        duration_ms: DurationMs,
    ) -> Self {
        Self {
            step_index,
            tool_name: tool_name.into(),
            tool_args,
            output,
            success: true,
            duration_ms,
            error: None,
            confidence: None,
        }
    }

    /// Construct a failed result.
    pub fn failure(
        step_index: usize,
        tool_name: impl Into<String>,
        tool_args: BTreeMap<String, serde_json::Value>,
        error: impl Into<String>,
        duration_ms: DurationMs,
    ) -> Self {
        Self {
            step_index,
            tool_name: tool_name.into(),
            tool_args,
            output: serde_json::Value::Null,
            success: false,
            duration_ms,
            error: Some(error.into()),
            confidence: None,
        }
    }
}
