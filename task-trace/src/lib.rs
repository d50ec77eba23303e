//! # task-trace — hierarchical span logging, a `tracing` bridge, and
//! post-hoc decision-graph extraction
//!
//! [`TraceLogger`] is the write side: it opens and closes spans and appends
//! typed events to them, always under a single lock and always computing
//! timestamps relative to its own construction so trace time stays
//! monotonic regardless of wall-clock jumps. Every recorded event is also
//! mirrored to `tracing` through the `bridge` module — the bridge observes,
//! it never changes what gets recorded.
//!
//! [`decision_graph`] is the read side: given a finished [`Trace`], it
//! extracts the events worth reasoning about post-hoc into a small graph and
//! can compute the critical path through it.

#![deny(missing_docs)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use task_types::{SpanId, TaskId, TimedEvent, Trace, TraceEvent, TraceSpan};

pub mod decision_graph;

/// Appends events and opens/closes spans on a single in-progress [`Trace`].
/// All mutation happens under one lock; span open/close and event append are
/// synchronous, non-suspending sections, same as the budget envelope.
pub struct TraceLogger {
    started: Instant,
    next_span_seq: AtomicU64,
    trace: Mutex<Trace>,
}

impl TraceLogger {
    /// Start a new trace for `task_id`, opening the root span.
    pub fn new(task_id: &TaskId) -> Self {
        let root_id = SpanId::new("span-0");
        let root = TraceSpan {
            id: root_id.clone(),
            name: "task".to_string(),
            parent: None,
            start_time_ms: 0,
            end_time_ms: None,
            events: Vec::new(),
            children: Vec::new(),
        };
        let mut spans = BTreeMap::new();
        spans.insert(root_id.clone(), root);
        Self {
            started: Instant::now(),
            next_span_seq: AtomicU64::new(1),
            trace: Mutex::new(Trace { id: task_id.as_str().to_string(), root: root_id, spans }),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// This trace's root span id.
    pub fn root(&self) -> SpanId {
        self.trace.lock().expect("trace lock poisoned").root.clone()
    }

    /// Open a new child span under `parent`, returning its id.
    pub fn open_span(&self, parent: &SpanId, name: impl Into<String>) -> SpanId {
        let seq = self.next_span_seq.fetch_add(1, Ordering::SeqCst);
        let id = SpanId::new(format!("span-{seq}"));
        let now = self.elapsed_ms();
        let span = TraceSpan {
            id: id.clone(),
            name: name.into(),
            parent: Some(parent.clone()),
            start_time_ms: now,
            end_time_ms: None,
            events: Vec::new(),
            children: Vec::new(),
        };
        let mut trace = self.trace.lock().expect("trace lock poisoned");
        trace.spans.insert(id.clone(), span);
        if let Some(parent_span) = trace.spans.get_mut(parent) {
            parent_span.children.push(id.clone());
        }
        id
    }

    /// Close `span`, stamping its end time. A no-op if the span is unknown
    /// or already closed.
    pub fn close_span(&self, span: &SpanId) {
        let now = self.elapsed_ms();
        let mut trace = self.trace.lock().expect("trace lock poisoned");
        if let Some(s) = trace.spans.get_mut(span) {
            if s.end_time_ms.is_none() {
                s.end_time_ms = Some(now);
            }
        }
    }

    /// Append `event` to `span`, mirroring it to `tracing` first.
    pub fn record_event(&self, span: &SpanId, event: TraceEvent) {
        bridge::emit(span, &event);
        let now = self.elapsed_ms();
        let mut trace = self.trace.lock().expect("trace lock poisoned");
        if let Some(s) = trace.spans.get_mut(span) {
            s.events.push(TimedEvent { timestamp_ms: now, event });
        }
    }

    /// Close the root span and return a snapshot of the completed trace.
    pub fn finish(&self) -> Trace {
        self.close_span(&self.root());
        self.trace.lock().expect("trace lock poisoned").clone()
    }
}

/// Bridges recorded [`TraceEvent`]s into `tracing` spans/events. This module
/// only observes: it never gates, delays, or mutates what `TraceLogger`
/// records, matching the rest of this codebase's "hooks observe, guards
/// decide" split.
mod bridge {
    use task_types::{SpanId, TraceEvent};

    pub(crate) fn emit(span: &SpanId, event: &TraceEvent) {
        match event {
            TraceEvent::StateTransition { from, to } => {
                tracing::info!(span = %span, from, to, "task.trace.state_transition");
            }
            TraceEvent::RoutingDecision { operation, provider, model, tier, reason } => {
                tracing::info!(
                    span = %span, operation, provider, model, tier, reason,
                    "task.trace.routing_decision"
                );
            }
            TraceEvent::PlanCritique { overall, issue_count } => {
                tracing::debug!(span = %span, overall, issue_count, "task.trace.plan_critique");
            }
            TraceEvent::Escalation { reason } => {
                tracing::warn!(span = %span, reason, "task.trace.escalation");
            }
            TraceEvent::Replan { failed_step_index, depth } => {
                tracing::warn!(span = %span, failed_step_index, depth, "task.trace.replan");
            }
            TraceEvent::SimulationResult { valid, issue_count } => {
                tracing::debug!(span = %span, valid, issue_count, "task.trace.simulation_result");
            }
            TraceEvent::GoalCheckpoint { on_track, steps_completed } => {
                tracing::debug!(
                    span = %span, on_track, steps_completed,
                    "task.trace.goal_checkpoint"
                );
            }
            TraceEvent::StrategySelected { step_index, strategy } => {
                tracing::debug!(span = %span, step_index, strategy, "task.trace.strategy_selected");
            }
            TraceEvent::Custom { name, data } => {
                tracing::debug!(span = %span, name, %data, "task.trace.custom");
            }
        }
    }
}
