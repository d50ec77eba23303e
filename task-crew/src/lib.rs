//! Multi-agent crew orchestration over [`task_executor`].
//!
//! A [`task_types::CrewDefinition`] composes several [`task_types::AgentDefinition`]s
//! under one of four strategies (sequential, parallel, hierarchical, graph).
//! Each agent runs in direct mode (a bounded tool-use loop) or full mode
//! (the complete task-executor pipeline), behind its own budget sub-envelope
//! and a tool registry scoped to its `allowed_tools`. Agents exchange
//! context through a shared [`task_types::Blackboard`]; results combine
//! into one [`task_types::CrewResult`] per the crew's `aggregation` mode.

mod agent_run;
mod aggregate;
mod budget_alloc;
mod direct;
mod full;
mod graph;
mod hierarchical;
mod json_parse;
mod parallel;
mod sequential;

use futures::stream::{self, Stream};
use std::sync::{Arc, Mutex};
use task_budget::Envelope;
use task_types::{
    AgentDefinition, Blackboard, BlackboardEntry, CrewDefinition, CrewResult, CrewStatus, CrewStrategy, EntryStatus,
    TaskResult, TaskStatus,
};

pub use agent_run::CrewDeps;

/// One observable step of a streamed crew run.
#[derive(Debug, Clone)]
pub enum CrewEvent {
    /// An agent began executing.
    AgentStarted { agent_id: String },
    /// An agent reached a terminal status.
    AgentCompleted { agent_id: String, status: TaskStatus },
    /// The crew finished; carries the same value [`run_crew`] returns.
    Done { result: CrewResult },
}

fn resolve_sequential_order(crew: &CrewDefinition) -> Vec<AgentDefinition> {
    match &crew.agent_order {
        Some(order) => order.iter().filter_map(|id| crew.agents.iter().find(|a| &a.id == id).cloned()).collect(),
        None => crew.agents.clone(),
    }
}

pub(crate) fn blackboard_context(blackboard: &Blackboard) -> String {
    blackboard
        .iter()
        .filter(|(_, entry)| !matches!(entry.status, EntryStatus::Pending))
        .map(|(key, entry)| format!("{key} ({:?}): {}", entry.status, entry.value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn write_agent_result(blackboard: &mut Blackboard, agent_id: &str, result: &TaskResult, now_ms: u64) {
    let status = match result.status {
        TaskStatus::Completed => EntryStatus::Completed,
        TaskStatus::Failed | TaskStatus::BudgetExhausted => EntryStatus::Failed,
        TaskStatus::Pending => EntryStatus::Running,
    };
    let value = serde_json::json!({ "result": result.result, "status": format!("{:?}", result.status) });
    blackboard.set(agent_id.to_string(), BlackboardEntry { value, timestamp: now_ms, status, metadata: None });
}

/// Run `crew` to completion against a fresh top-level envelope for
/// `crew.budget_preset`. Agent budgets are carved out up front via
/// [`budget_alloc::allocate`] so no strategy can let one agent starve
/// another out of share it was never promised.
pub async fn run_crew(deps: &CrewDeps<'_>, crew: &CrewDefinition, task_description: &str, now_ms: u64) -> CrewResult {
    let parent = Envelope::create(crew.budget_preset, now_ms);
    let allocated = budget_alloc::allocate(&crew.agents, &parent);
    let blackboard: Arc<Mutex<Blackboard>> = Arc::new(Mutex::new(Blackboard::new()));

    let dispatch = match crew.strategy {
        CrewStrategy::Sequential => {
            let ordered = resolve_sequential_order(crew);
            Ok(sequential::run(deps, &ordered, task_description, &blackboard, &allocated, now_ms).await)
        }
        CrewStrategy::Parallel => {
            Ok(parallel::run(deps, &crew.agents, task_description, &blackboard, &allocated, now_ms).await)
        }
        CrewStrategy::Hierarchical => {
            Ok(hierarchical::run(deps, &crew.agents, task_description, &blackboard, &allocated, now_ms).await)
        }
        CrewStrategy::Graph => {
            graph::run(deps, &crew.agents, &crew.graph, task_description, &blackboard, &allocated, now_ms).await
        }
    };

    match dispatch {
        Ok(agent_results) => {
            let aggregated_result = aggregate::aggregate(
                crew.aggregation,
                crew.aggregation_prompt.as_deref(),
                &agent_results,
                deps.table,
                deps.llm,
                &parent,
            )
            .await;
            let status = if !agent_results.is_empty()
                && agent_results.iter().all(|r| r.task_result.status == TaskStatus::Completed)
            {
                CrewStatus::Completed
            } else {
                CrewStatus::Partial
            };
            CrewResult { name: crew.name.clone(), agent_results, aggregated_result, status, error: None }
        }
        Err(message) => {
            tracing::warn!(crew = %crew.name, error = %message, "task.crew.dispatch_failed");
            CrewResult {
                name: crew.name.clone(),
                agent_results: Vec::new(),
                aggregated_result: String::new(),
                status: CrewStatus::Failed,
                error: Some(message),
            }
        }
    }
}

/// Run `crew` and replay its agent transitions as a stream, ending with a
/// [`CrewEvent::Done`] carrying the same [`CrewResult`] [`run_crew`] returns.
pub async fn execute_crew_stream(
    deps: &CrewDeps<'_>,
    crew: &CrewDefinition,
    task_description: &str,
    now_ms: u64,
) -> impl Stream<Item = CrewEvent> {
    let result = run_crew(deps, crew, task_description, now_ms).await;
    let mut events: Vec<CrewEvent> = result
        .agent_results
        .iter()
        .flat_map(|r| {
            vec![
                CrewEvent::AgentStarted { agent_id: r.agent_id.clone() },
                CrewEvent::AgentCompleted { agent_id: r.agent_id.clone(), status: r.task_result.status },
            ]
        })
        .collect();
    events.push(CrewEvent::Done { result });
    stream::iter(events)
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
    use task_types::{AggregationMode, BudgetPreset, ExecutionMode, GraphEdge};
    use futures::StreamExt;

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
        table.register(
            task_providers::Tier::Llm,
            ProviderBinding { provider: "local".to_string(), model: "big".to_string(), cost_per_1k_tokens: Decimal::ZERO },
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

    fn crew(strategy: CrewStrategy, graph: Vec<GraphEdge>) -> CrewDefinition {
        CrewDefinition {
            name: "test-crew".to_string(),
            agents: vec![agent("a"), agent("b")],
            strategy,
            graph,
            aggregation: AggregationMode::Concat,
            aggregation_prompt: None,
            budget_preset: BudgetPreset::High,
            agent_order: None,
        }
    }

    #[tokio::test]
    async fn sequential_crew_aggregates_both_agents() {
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = CrewDeps { table: &table, slm: &slm, llm: &llm, registry: &registry, constitution: &constitution };
        let definition = crew(CrewStrategy::Sequential, Vec::new());

        let result = run_crew(&deps, &definition, "do the thing", 0).await;
        assert_eq!(result.status, CrewStatus::Completed);
        assert_eq!(result.agent_results.len(), 2);
        assert!(result.aggregated_result.contains("[a]"));
        assert!(result.aggregated_result.contains("[b]"));
    }

    #[tokio::test]
    async fn graph_cycle_fails_the_whole_crew() {
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = CrewDeps { table: &table, slm: &slm, llm: &llm, registry: &registry, constitution: &constitution };
        let definition = crew(
            CrewStrategy::Graph,
            vec![
                GraphEdge { from: "a".to_string(), to: "b".to_string(), condition: None },
                GraphEdge { from: "b".to_string(), to: "a".to_string(), condition: None },
            ],
        );

        let result = run_crew(&deps, &definition, "do the thing", 0).await;
        assert_eq!(result.status, CrewStatus::Failed);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn stream_ends_with_done_event() {
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = CrewDeps { table: &table, slm: &slm, llm: &llm, registry: &registry, constitution: &constitution };
        let definition = crew(CrewStrategy::Parallel, Vec::new());

        let events: Vec<CrewEvent> = execute_crew_stream(&deps, &definition, "do the thing", 0).await.collect().await;
        assert!(matches!(events.last(), Some(CrewEvent::Done { .. })));
    }
}
