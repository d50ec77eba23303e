//! Hierarchical strategy: the first agent manages the rest. It delegates
//! in a first pass, the workers it names run in the order it gave, and it
//! synthesizes their outputs in a final pass.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use task_budget::Envelope;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role};
use task_router::{route, Operation, ProviderTable};
use task_trace::TraceLogger;
use task_types::{AgentDefinition, AgentRunResult, Blackboard, BudgetPreset, TaskId, TaskResult, TaskStatus};

use crate::agent_run::{run_agent, CrewDeps};

const MANAGER_DELEGATION_PROMPT: &str = "You are managing a crew of worker agents. Decide which workers should \
run and what instructions to give each one. Respond with a single JSON object: \
{\"delegations\":[{\"agentId\":\"<id>\",\"instructions\":\"<instructions>\"}]}. Only reference worker ids \
from the roster below.";

const MANAGER_SYNTHESIS_PROMPT: &str = "You are managing a crew of worker agents. Using their outputs below, \
produce one final answer for the original task. Be concise and direct.";

#[derive(Debug, Deserialize)]
struct DelegationPlan {
    delegations: Vec<Delegation>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Delegation {
    agent_id: String,
    instructions: String,
}

fn roster(workers: &[&AgentDefinition]) -> String {
    workers.iter().map(|w| format!("- {} ({}): {}", w.id, w.role, w.instructions)).collect::<Vec<_>>().join("\n")
}

fn fallback_delegations(workers: &[&AgentDefinition]) -> Vec<Delegation> {
    workers.iter().map(|w| Delegation { agent_id: w.id.clone(), instructions: w.instructions.clone() }).collect()
}

pub(crate) async fn run(
    deps: &CrewDeps<'_>,
    agents: &[AgentDefinition],
    task_description: &str,
    blackboard: &Arc<Mutex<Blackboard>>,
    envelopes: &HashMap<String, Envelope>,
    now_ms: u64,
) -> Vec<AgentRunResult> {
    let Some(manager) = agents.first() else { return Vec::new() };
    let workers: Vec<&AgentDefinition> = agents.iter().skip(1).collect();
    let manager_envelope =
        envelopes.get(&manager.id).cloned().unwrap_or_else(|| Envelope::create(BudgetPreset::Low, now_ms));

    {
        let mut bb = blackboard.lock().expect("blackboard lock poisoned");
        bb.set_status(&manager.id, task_types::EntryStatus::Running, now_ms);
    }

    // Phase 1: delegation, capped at 30% of the manager's own share.
    let phase1_envelope = manager_envelope.sub_envelope(0.3);
    let delegation_system = format!("{MANAGER_DELEGATION_PROMPT}\n\nWorkers:\n{}", roster(&workers));
    let delegation_decision = route(deps.table, Operation::Plan, 0.7, &phase1_envelope);
    let delegation_request = ModelRequest {
        model: delegation_decision.model,
        provider: delegation_decision.provider,
        tier: task_providers::Tier::Llm,
        system: delegation_system,
        messages: vec![RequestMessage { role: Role::User, content: task_description.to_string() }],
        response_format: ResponseFormat::Json,
        temperature: 0.2,
    };
    let delegations = match deps.llm.chat(delegation_request).await {
        Ok(response) => {
            phase1_envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
            phase1_envelope.deduct_cost(response.cost_usd);
            phase1_envelope.deduct_latency_tick(response.latency_ms);
            crate::json_parse::parse_tolerant::<DelegationPlan>(&response.content)
                .map(|plan| plan.delegations)
                .unwrap_or_else(|| fallback_delegations(&workers))
        }
        Err(err) => {
            tracing::warn!(error = %err, "task.crew.hierarchical_delegation_failed");
            fallback_delegations(&workers)
        }
    };

    {
        let mut bb = blackboard.lock().expect("blackboard lock poisoned");
        bb.set(
            format!("{}_plan", manager.id),
            task_types::BlackboardEntry::new(serde_json::json!({ "delegations": delegations }), now_ms),
        );
    }

    // Phase 2: run each delegated worker in manager order.
    let worker_by_id: HashMap<&str, &AgentDefinition> = workers.iter().map(|w| (w.id.as_str(), *w)).collect();
    let mut results = Vec::new();
    for delegation in &delegations {
        let Some(worker) = worker_by_id.get(delegation.agent_id.as_str()) else {
            tracing::warn!(agent = %delegation.agent_id, "task.crew.hierarchical_unknown_delegate");
            continue;
        };
        let mut scoped_worker = (*worker).clone();
        scoped_worker.instructions = delegation.instructions.clone();

        {
            let mut bb = blackboard.lock().expect("blackboard lock poisoned");
            bb.set_status(&scoped_worker.id, task_types::EntryStatus::Running, now_ms);
        }
        let context = { let bb = blackboard.lock().expect("blackboard lock poisoned"); crate::blackboard_context(&bb) };
        let envelope =
            envelopes.get(&scoped_worker.id).cloned().unwrap_or_else(|| Envelope::create(BudgetPreset::Low, now_ms));
        let task_result = run_agent(&scoped_worker, task_description, &context, deps, &envelope, now_ms).await;
        {
            let mut bb = blackboard.lock().expect("blackboard lock poisoned");
            crate::write_agent_result(&mut bb, &scoped_worker.id, &task_result, now_ms);
        }
        results.push(AgentRunResult { agent_id: scoped_worker.id.clone(), task_result });
    }

    // Phase 3: synthesis over whatever share of the manager's budget remains.
    let phase3_envelope = manager_envelope.sub_envelope(1.0);
    let worker_outputs: String = results
        .iter()
        .map(|r| format!("[{}]\n{}", r.agent_id, r.task_result.result.clone().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n\n");
    let synthesis_decision = route(deps.table, Operation::Synthesize, 1.0, &phase3_envelope);
    let synthesis_request = ModelRequest {
        model: synthesis_decision.model,
        provider: synthesis_decision.provider,
        tier: task_providers::Tier::Llm,
        system: MANAGER_SYNTHESIS_PROMPT.to_string(),
        messages: vec![RequestMessage {
            role: Role::User,
            content: format!("Original task: {task_description}\n\nWorker outputs:\n{worker_outputs}"),
        }],
        response_format: ResponseFormat::Text,
        temperature: 0.3,
    };

    let trace = TraceLogger::new(&TaskId::new(manager.id.clone()));
    let (status, text, error) = match deps.llm.chat(synthesis_request).await {
        Ok(response) => {
            phase3_envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
            phase3_envelope.deduct_cost(response.cost_usd);
            phase3_envelope.deduct_latency_tick(response.latency_ms);
            let filtered = match deps.constitution.validate_output(&response.content) {
                Some(violation) => {
                    tracing::warn!(rule_id = %violation.rule_id, "task.crew.hierarchical_synthesis_filtered");
                    "[Response filtered: violated a constitution output rule]".to_string()
                }
                None => response.content,
            };
            (TaskStatus::Completed, filtered, None)
        }
        Err(err) => {
            tracing::warn!(error = %err, "task.crew.hierarchical_synthesis_failed");
            (TaskStatus::Failed, worker_outputs, Some(err.to_string()))
        }
    };
    let finished_trace = trace.finish();

    let manager_result = TaskResult {
        id: manager.id.clone(),
        task_id: manager.id.clone(),
        trace_id: finished_trace.id.clone(),
        status,
        result: Some(text),
        step_results: Vec::new(),
        budget_usage: manager_envelope.usage(),
        trace: finished_trace,
        spec: None,
        criteria_results: Vec::new(),
        simulation_result: None,
        efficiency_report: None,
        error,
        completed_at: now_ms,
    };
    {
        let mut bb = blackboard.lock().expect("blackboard lock poisoned");
        bb.set(format!("{}_synthesis", manager.id), task_types::BlackboardEntry::new(
            serde_json::json!({ "result": manager_result.result }),
            now_ms,
        ));
        crate::write_agent_result(&mut bb, &manager.id, &manager_result, now_ms);
    }

    let mut all_results = vec![AgentRunResult { agent_id: manager.id.clone(), task_result: manager_result }];
    all_results.extend(results);
    all_results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use task_constitution::Constitution;
    use task_providers::{FinishReason, ModelResponse, ProviderError, TokenUsage};
    use task_router::ProviderBinding;
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

    #[tokio::test]
    async fn manager_runs_first_and_every_worker_still_gets_delegated() {
        let table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = CrewDeps { table: &table, slm: &slm, llm: &llm, registry: &registry, constitution: &constitution };

        let agents = vec![agent("manager"), agent("a"), agent("b")];
        let allocated = crate::budget_alloc::allocate(&agents, &Envelope::create(Preset::High, 0));
        let blackboard = Arc::new(Mutex::new(Blackboard::new()));

        let results = run(&deps, &agents, "do the thing", &blackboard, &allocated, 0).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].agent_id, "manager");
        assert!(results.iter().any(|r| r.agent_id == "a"));
        assert!(results.iter().any(|r| r.agent_id == "b"));

        let bb = blackboard.lock().unwrap();
        assert!(bb.get("manager_plan").is_some());
        assert!(bb.get("manager_synthesis").is_some());
    }

    #[tokio::test]
    async fn crew_with_only_a_manager_returns_empty_results() {
        let deps_table = table();
        let slm = StaticProvider;
        let llm = StaticProvider;
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps =
            CrewDeps { table: &deps_table, slm: &slm, llm: &llm, registry: &registry, constitution: &constitution };

        let blackboard = Arc::new(Mutex::new(Blackboard::new()));
        let allocated = HashMap::new();
        let results = run(&deps, &[], "do the thing", &blackboard, &allocated, 0).await;
        assert!(results.is_empty());
    }
}
