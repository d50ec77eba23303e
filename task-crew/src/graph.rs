//! Graph strategy: agents form a DAG. Layers run in topological order, each
//! layer's agents concurrently; an edge's condition gates whether its
//! target runs at all. A cycle fails the whole crew before anything runs.
//!
//! Conditions are restricted to three safe string patterns — never
//! evaluated as code:
//!   - `agentId.status === "completed"` — another agent's terminal status
//!   - `blackboard.key === "value"` — an exact blackboard value match
//!   - `blackboard.key` — truthy check on a blackboard value
//! An unrecognized pattern fails open (treated as satisfied) rather than
//! silently stalling the graph.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use task_budget::Envelope;
use task_types::{AgentDefinition, AgentRunResult, Blackboard, BudgetPreset, EntryStatus, GraphEdge};

use crate::agent_run::{run_agent, CrewDeps};

fn value_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

fn evaluate_condition(condition: &str, blackboard: &Blackboard) -> bool {
    let condition = condition.trim();
    if let Some((lhs, rhs)) = condition.split_once("===") {
        let lhs = lhs.trim();
        let rhs = rhs.trim().trim_matches('"');
        if let Some(agent_id) = lhs.strip_suffix(".status") {
            return blackboard
                .get(agent_id)
                .map(|entry| format!("{:?}", entry.status).eq_ignore_ascii_case(rhs))
                .unwrap_or(false);
        }
        if let Some(key) = lhs.strip_prefix("blackboard.") {
            return blackboard.get(key).map(|entry| value_as_string(&entry.value) == rhs).unwrap_or(false);
        }
        return true;
    }
    if let Some(key) = condition.strip_prefix("blackboard.") {
        return blackboard.get(key).map(|entry| is_truthy(&entry.value)).unwrap_or(false);
    }
    true
}

fn incoming_conditions_pass(agent_id: &str, edges: &[GraphEdge], blackboard: &Blackboard) -> bool {
    edges
        .iter()
        .filter(|edge| edge.to == agent_id)
        .all(|edge| match &edge.condition {
            None => true,
            Some(condition) => evaluate_condition(condition, blackboard),
        })
}

pub(crate) async fn run(
    deps: &CrewDeps<'_>,
    agents: &[AgentDefinition],
    edges: &[GraphEdge],
    task_description: &str,
    blackboard: &Arc<Mutex<Blackboard>>,
    envelopes: &HashMap<String, Envelope>,
    now_ms: u64,
) -> Result<Vec<AgentRunResult>, String> {
    let known_ids: HashSet<&str> = agents.iter().map(|a| a.id.as_str()).collect();
    let valid_edges: Vec<GraphEdge> =
        edges.iter().filter(|e| known_ids.contains(e.from.as_str()) && known_ids.contains(e.to.as_str())).cloned().collect();

    let mut in_degree: HashMap<&str, usize> = agents.iter().map(|a| (a.id.as_str(), 0usize)).collect();
    for edge in &valid_edges {
        *in_degree.get_mut(edge.to.as_str()).expect("filtered to known ids") += 1;
    }

    let mut remaining: HashSet<&str> = known_ids.clone();
    let mut results = Vec::new();

    while !remaining.is_empty() {
        let mut layer: Vec<&AgentDefinition> = agents
            .iter()
            .filter(|a| remaining.contains(a.id.as_str()) && in_degree[a.id.as_str()] == 0)
            .collect();
        if layer.is_empty() {
            let mut unplaced: Vec<&str> = remaining.into_iter().collect();
            unplaced.sort_unstable();
            return Err(format!("graph cycle detected: unplaced agents [{}]", unplaced.join(", ")));
        }
        layer.sort_by_key(|a| agents.iter().position(|x| x.id == a.id).unwrap_or(usize::MAX));

        let runnable: Vec<&AgentDefinition> = {
            let bb = blackboard.lock().expect("blackboard lock poisoned");
            layer.iter().filter(|a| incoming_conditions_pass(&a.id, &valid_edges, &bb)).copied().collect()
        };

        {
            let mut bb = blackboard.lock().expect("blackboard lock poisoned");
            for agent in &runnable {
                bb.set_status(&agent.id, EntryStatus::Running, now_ms);
            }
        }
        let context = {
            let bb = blackboard.lock().expect("blackboard lock poisoned");
            crate::blackboard_context(&bb)
        };

        let futures = runnable.iter().map(|agent| {
            let envelope =
                envelopes.get(&agent.id).cloned().unwrap_or_else(|| Envelope::create(BudgetPreset::Low, now_ms));
            let context = context.clone();
            async move {
                let task_result = run_agent(agent, task_description, &context, deps, &envelope, now_ms).await;
                ((*agent).id.clone(), task_result)
            }
        });
        let outcomes = join_all(futures).await;

        {
            let mut bb = blackboard.lock().expect("blackboard lock poisoned");
            for (agent_id, task_result) in outcomes {
                crate::write_agent_result(&mut bb, &agent_id, &task_result, now_ms);
                results.push(AgentRunResult { agent_id, task_result });
            }
        }

        for agent in &layer {
            remaining.remove(agent.id.as_str());
            for edge in valid_edges.iter().filter(|e| e.from == agent.id) {
                if let Some(count) = in_degree.get_mut(edge.to.as_str()) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use task_constitution::Constitution;
    use task_providers::{FinishReason, ModelRequest, ModelResponse, Provider, ProviderError, TokenUsage};
    use task_router::{ProviderBinding, ProviderTable};
    use task_tools::ToolRegistry;
    use task_types::{BudgetPreset as Preset, ExecutionMode};

    struct StaticProvider;

    #[async_trait]
    impl Provider for StaticProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            Ok(ModelResponse {
                content: r#"{"action":"final","text":"done"}"#.to_string(),
                model: request.model,
                provider: "stub".to_string(),
                tier: request.tier,
                token_usage: TokenUsage::default(),
                latency_ms: 1,
                cost_usd: Decimal::ZERO,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    fn table() -> ProviderTable {
        let mut table = ProviderTable::new();
        table.register(
            task_providers::Tier::Slm,
            ProviderBinding { provider: "local".to_string(), model: "small".to_string(), cost_per_1k_tokens: Decimal::ZERO },
        );
        table
    }

    fn agent(id: &str) -> AgentDefinition {
        AgentDefinition {
            id: id.to_string(),
            role: "worker".to_string(),
            instructions: "do work".to_string(),
            budget_share: None,
            execution_mode: ExecutionMode::Direct,
            max_retries: Some(0),
            output_schema: None,
            allowed_tools: None,
        }
    }

    fn deps_fixture<'a>(table: &'a ProviderTable, slm: &'a StaticProvider, llm: &'a StaticProvider, registry: &'a ToolRegistry, constitution: &'a Constitution) -> CrewDeps<'a> {
        CrewDeps { table, slm, llm, registry, constitution }
    }

    #[tokio::test]
    async fn runs_layers_in_topological_order() {
        let agents = vec![agent("a"), agent("b"), agent("c")];
        let edges = vec![
            GraphEdge { from: "a".to_string(), to: "b".to_string(), condition: None },
            GraphEdge { from: "b".to_string(), to: "c".to_string(), condition: None },
        ];
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = deps_fixture(&table, &slm, &llm, &registry, &constitution);
        let parent = Envelope::create(Preset::High, 0);
        let envelopes = crate::budget_alloc::allocate(&agents, &parent);
        let blackboard = Arc::new(Mutex::new(Blackboard::new()));

        let results = run(&deps, &agents, &edges, "do the thing", &blackboard, &envelopes, 0).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cycle_is_rejected_before_anything_runs() {
        let agents = vec![agent("a"), agent("b")];
        let edges = vec![
            GraphEdge { from: "a".to_string(), to: "b".to_string(), condition: None },
            GraphEdge { from: "b".to_string(), to: "a".to_string(), condition: None },
        ];
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = deps_fixture(&table, &slm, &llm, &registry, &constitution);
        let parent = Envelope::create(Preset::High, 0);
        let envelopes = crate::budget_alloc::allocate(&agents, &parent);
        let blackboard = Arc::new(Mutex::new(Blackboard::new()));

        let err = run(&deps, &agents, &edges, "do the thing", &blackboard, &envelopes, 0).await.unwrap_err();
        assert!(err.contains('a') && err.contains('b'));
    }

    #[tokio::test]
    async fn unsatisfied_condition_skips_the_target() {
        let agents = vec![agent("a"), agent("b")];
        let edges = vec![GraphEdge {
            from: "a".to_string(),
            to: "b".to_string(),
            condition: Some("blackboard.flag".to_string()),
        }];
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = deps_fixture(&table, &slm, &llm, &registry, &constitution);
        let parent = Envelope::create(Preset::High, 0);
        let envelopes = crate::budget_alloc::allocate(&agents, &parent);
        let blackboard = Arc::new(Mutex::new(Blackboard::new()));

        let results = run(&deps, &agents, &edges, "do the thing", &blackboard, &envelopes, 0).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }
}
