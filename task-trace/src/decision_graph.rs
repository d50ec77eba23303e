//! Post-hoc extraction of a decision graph from a finished [`Trace`].
//!
//! This never runs while a task is executing — it is handed a completed
//! trace (from [`crate::TraceLogger::finish`] or a persisted one) and
//! produces a small graph useful for explaining why the task took the path
//! it took.

use std::collections::{HashMap, HashSet};
use task_types::{SpanId, Trace, TraceEvent};

fn event_kind(event: &TraceEvent) -> &'static str {
    match event {
        TraceEvent::StateTransition { .. } => "state_transition",
        TraceEvent::RoutingDecision { .. } => "routing_decision",
        TraceEvent::PlanCritique { .. } => "plan_critique",
        TraceEvent::Escalation { .. } => "escalation",
        TraceEvent::Replan { .. } => "replan",
        TraceEvent::SimulationResult { .. } => "simulation_result",
        TraceEvent::GoalCheckpoint { .. } => "goal_checkpoint",
        TraceEvent::StrategySelected { .. } => "strategy_selected",
        TraceEvent::Custom { .. } => "custom",
    }
}

const DECISION_EVENT_KINDS: &[&str] = &[
    "state_transition",
    "routing_decision",
    "plan_critique",
    "escalation",
    "replan",
    "simulation_result",
    "goal_checkpoint",
    "strategy_selected",
];

/// One decision-worthy event, tagged with the span it was recorded on.
#[derive(Debug, Clone)]
pub struct DecisionNode {
    /// Unique within one graph: `"<span id>#<event index within span>"`.
    pub id: String,
    /// The span this event was recorded on.
    pub span: SpanId,
    /// Trace-relative timestamp, in milliseconds.
    pub timestamp_ms: u64,
    /// The underlying event.
    pub event: TraceEvent,
}

/// How one decision node relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// A direct causal link; not produced by [`build`], but part of the
    /// vocabulary the critical-path walk traverses.
    Caused,
    /// Chronological adjacency: `from` is the node immediately before `to`
    /// across the whole trace.
    LedTo,
    /// `from` is an escalation event and `to` is the next node recorded on
    /// a `recover`-named span.
    Triggered,
}

/// A directed edge between two [`DecisionNode`]s.
#[derive(Debug, Clone)]
pub struct DecisionEdge {
    /// Source node id.
    pub from: String,
    /// Destination node id.
    pub to: String,
    /// The relationship this edge represents.
    pub kind: EdgeKind,
}

/// The extracted graph: decision-worthy nodes plus the edges between them.
#[derive(Debug, Clone, Default)]
pub struct DecisionGraph {
    /// Nodes, ordered by timestamp.
    pub nodes: Vec<DecisionNode>,
    /// Edges between nodes.
    pub edges: Vec<DecisionEdge>,
}

/// Walk `trace` depth-first from its root, collect every decision-worthy
/// event into a [`DecisionNode`], then wire `led_to` edges between
/// timestamp-adjacent nodes and `triggered` edges from escalations to the
/// next node on a `recover` span.
pub fn build(trace: &Trace) -> DecisionGraph {
    let mut span_order = Vec::new();
    depth_first(&trace.root, trace, &mut span_order, &mut HashSet::new());

    let mut nodes = Vec::new();
    for span_id in &span_order {
        let Some(span) = trace.spans.get(span_id) else { continue };
        for (i, timed) in span.events.iter().enumerate() {
            if DECISION_EVENT_KINDS.contains(&event_kind(&timed.event)) {
                nodes.push(DecisionNode {
                    id: format!("{span_id}#{i}"),
                    span: span_id.clone(),
                    timestamp_ms: timed.timestamp_ms,
                    event: timed.event.clone(),
                });
            }
        }
    }
    nodes.sort_by_key(|n| n.timestamp_ms);

    let mut edges = Vec::new();
    for pair in nodes.windows(2) {
        edges.push(DecisionEdge {
            from: pair[0].id.clone(),
            to: pair[1].id.clone(),
            kind: EdgeKind::LedTo,
        });
    }

    for (i, node) in nodes.iter().enumerate() {
        if !matches!(node.event, TraceEvent::Escalation { .. }) {
            continue;
        }
        let target = nodes[i + 1..]
            .iter()
            .find(|candidate| {
                trace
                    .spans
                    .get(&candidate.span)
                    .map(|s| s.name == "recover")
                    .unwrap_or(false)
            });
        if let Some(target) = target {
            edges.push(DecisionEdge {
                from: node.id.clone(),
                to: target.id.clone(),
                kind: EdgeKind::Triggered,
            });
        }
    }

    DecisionGraph { nodes, edges }
}

fn depth_first(id: &SpanId, trace: &Trace, order: &mut Vec<SpanId>, visited: &mut HashSet<SpanId>) {
    if !visited.insert(id.clone()) {
        return;
    }
    order.push(id.clone());
    if let Some(span) = trace.spans.get(id) {
        for child in &span.children {
            depth_first(child, trace, order, visited);
        }
    }
}

impl DecisionGraph {
    /// The longest chain over `caused|led_to|triggered` edges, found by DFS
    /// with memoisation. A node revisited on the current path breaks the
    /// cycle: the walk stops there and returns a single-node path.
    pub fn critical_path(&self) -> Vec<String> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }
        let mut memo: HashMap<String, Vec<String>> = HashMap::new();
        let mut best: Vec<String> = Vec::new();
        for node in &self.nodes {
            let mut on_stack = HashSet::new();
            let path = longest_from(&node.id, &adjacency, &mut memo, &mut on_stack);
            if path.len() > best.len() {
                best = path;
            }
        }
        best
    }
}

fn longest_from(
    id: &str,
    adjacency: &HashMap<&str, Vec<&str>>,
    memo: &mut HashMap<String, Vec<String>>,
    on_stack: &mut HashSet<String>,
) -> Vec<String> {
    if let Some(cached) = memo.get(id) {
        return cached.clone();
    }
    if !on_stack.insert(id.to_string()) {
        return vec![id.to_string()];
    }
    let mut best = vec![id.to_string()];
    if let Some(children) = adjacency.get(id) {
        for &child in children {
            let mut candidate = vec![id.to_string()];
            candidate.extend(longest_from(child, adjacency, memo, on_stack));
            if candidate.len() > best.len() {
                best = candidate;
            }
        }
    }
    on_stack.remove(id);
    memo.insert(id.to_string(), best.clone());
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceLogger;
    use task_types::TaskId;

    #[test]
    fn led_to_edges_connect_every_adjacent_pair() {
        let logger = TraceLogger::new(&TaskId::new("t1"));
        let root = logger.root();
        logger.record_event(&root, TraceEvent::StateTransition { from: "idle".into(), to: "spec".into() });
        logger.record_event(&root, TraceEvent::StateTransition { from: "spec".into(), to: "plan".into() });
        logger.record_event(&root, TraceEvent::StateTransition { from: "plan".into(), to: "act".into() });
        let trace = logger.finish();
        let graph = build(&trace);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.iter().filter(|e| e.kind == EdgeKind::LedTo).count(), 2);
    }

    #[test]
    fn escalation_triggers_the_next_recover_span_node() {
        let logger = TraceLogger::new(&TaskId::new("t1"));
        let root = logger.root();
        logger.record_event(&root, TraceEvent::Escalation { reason: "budget".into() });
        let recover = logger.open_span(&root, "recover");
        logger.record_event(&recover, TraceEvent::Replan { failed_step_index: 2, depth: 1 });
        logger.close_span(&recover);
        let trace = logger.finish();
        let graph = build(&trace);
        let triggered: Vec<_> = graph.edges.iter().filter(|e| e.kind == EdgeKind::Triggered).collect();
        assert_eq!(triggered.len(), 1);
        assert!(triggered[0].to.starts_with(recover.as_str()));
    }

    #[test]
    fn custom_events_are_excluded_from_the_graph() {
        let logger = TraceLogger::new(&TaskId::new("t1"));
        let root = logger.root();
        logger.record_event(&root, TraceEvent::Custom {
            name: "task.engine.started".into(),
            data: serde_json::json!({}),
        });
        let trace = logger.finish();
        let graph = build(&trace);
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn critical_path_follows_the_longest_chain() {
        let logger = TraceLogger::new(&TaskId::new("t1"));
        let root = logger.root();
        logger.record_event(&root, TraceEvent::StateTransition { from: "idle".into(), to: "spec".into() });
        logger.record_event(&root, TraceEvent::StateTransition { from: "spec".into(), to: "plan".into() });
        logger.record_event(&root, TraceEvent::StateTransition { from: "plan".into(), to: "act".into() });
        let trace = logger.finish();
        let graph = build(&trace);
        let path = graph.critical_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), graph.nodes.first().map(|n| &n.id));
    }
}
