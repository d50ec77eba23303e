//! Trace data model — hierarchical spans and the typed events they carry.
//!
//! This module defines only the *shapes*. The logger that opens/closes
//! spans and appends events lives in `task-trace`; the decision-graph
//! extraction that walks a finished [`Trace`] also lives there.

use crate::duration::DurationMs;
use crate::id::SpanId;
use serde::{Deserialize, Serialize};

/// A typed event recorded on a span. Every variant the executor, planner,
/// or crew orchestrator can emit is named here so the decision-graph
/// builder can pattern-match without parsing free-text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// The executor's state machine moved from one state to another.
    StateTransition {
        /// State being left.
        from: String,
        /// State being entered.
        to: String,
    },
    /// The model router chose a (provider, model, tier) for an operation.
    RoutingDecision {
        /// `classify` | `plan` | `synthesize` | `escalate`.
        operation: String,
        /// Chosen provider id.
        provider: String,
        /// Chosen model id.
        model: String,
        /// `slm` | `llm`.
        tier: String,
        /// Why this tier/model was chosen.
        reason: String,
    },
    /// The critique stage scored a plan.
    PlanCritique {
        /// Overall confidence in `[0, 1]`.
        overall: f64,
        /// Number of issues the critic raised.
        issue_count: usize,
    },
    /// An escalation from SLM to LLM tier, consuming one escalation budget.
    Escalation {
        /// Why escalation was triggered.
        reason: String,
    },
    /// A step failed and the planner produced a recovery plan for the tail.
    Replan {
        /// Index of the step that failed.
        failed_step_index: usize,
        /// How many replans have happened so far this task (including this one).
        depth: u32,
    },
    /// The simulator finished validating a plan.
    SimulationResult {
        /// Whether the plan was left valid after filtering.
        valid: bool,
        /// Number of issues found.
        issue_count: usize,
    },
    /// A periodic on-track check during long executions.
    GoalCheckpoint {
        /// Whether the checkpoint judged execution on track.
        on_track: bool,
        /// Steps completed so far.
        steps_completed: usize,
    },
    /// An automation strategy was assigned to a step.
    StrategySelected {
        /// Index of the step.
        step_index: usize,
        /// `dom` | `vision` | `api`.
        strategy: String,
    },
    /// Free-form event for everything not worth a dedicated variant.
    Custom {
        /// Namespaced event name.
        name: String,
        /// Arbitrary payload.
        data: serde_json::Value,
    },
}

/// One recorded event with its timing, attached to a [`TraceSpan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Milliseconds since the root span started.
    pub timestamp_ms: u64,
    /// The event payload.
    pub event: TraceEvent,
}

/// A span in the hierarchical trace tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    /// This span's id.
    pub id: SpanId,
    /// Human-readable span name (e.g. `"plan"`, `"act:step_2"`).
    pub name: String,
    /// Parent span id, `None` for the root span.
    pub parent: Option<SpanId>,
    /// Milliseconds since the root span started.
    pub start_time_ms: u64,
    /// Milliseconds since the root span started, `None` while still open.
    pub end_time_ms: Option<u64>,
    /// Events recorded directly on this span, in emission order.
    pub events: Vec<TimedEvent>,
    /// Child span ids, in creation order.
    pub children: Vec<SpanId>,
}

impl TraceSpan {
    /// Wall-clock duration of a closed span; `None` if still open.
    pub fn duration(&self) -> Option<DurationMs> {
        self.end_time_ms
            .map(|end| DurationMs::from_millis(end.saturating_sub(self.start_time_ms)))
    }
}

/// The complete trace for one task: every span, keyed by id, plus the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// This trace's id.
    pub id: String,
    /// The root span's id.
    pub root: SpanId,
    /// Every span in the trace, including the root.
    pub spans: std::collections::BTreeMap<SpanId, TraceSpan>,
}

impl Trace {
    /// Flatten all events across all spans, in `(span_id, event)` pairs,
    /// ordered by timestamp then by span id (stable tie-break).
    pub fn events_by_time(&self) -> Vec<(SpanId, &TimedEvent)> {
        let mut all: Vec<(SpanId, &TimedEvent)> = self
            .spans
            .iter()
            .flat_map(|(id, span)| span.events.iter().map(move |e| (id.clone(), e)))
            .collect();
        all.sort_by(|a, b| {
            a.1.timestamp_ms
                .cmp(&b.1.timestamp_ms)
                .then_with(|| a.0.cmp(&b.0))
        });
        all
    }
}
