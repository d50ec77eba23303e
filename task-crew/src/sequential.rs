//! Sequential strategy: agents run one after another. A failure never halts
//! the pipeline — every agent still gets its turn.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use task_budget::Envelope;
use task_types::{AgentDefinition, AgentRunResult, Blackboard, BudgetPreset, EntryStatus};

use crate::agent_run::{run_agent, CrewDeps};

pub(crate) async fn run(
    deps: &CrewDeps<'_>,
    agents: &[AgentDefinition],
    task_description: &str,
    blackboard: &Arc<Mutex<Blackboard>>,
    envelopes: &HashMap<String, Envelope>,
    now_ms: u64,
) -> Vec<AgentRunResult> {
    let mut results = Vec::with_capacity(agents.len());
    for agent in agents {
        {
            let mut bb = blackboard.lock().expect("blackboard lock poisoned");
            bb.set_status(&agent.id, EntryStatus::Running, now_ms);
        }
        let context = {
            let bb = blackboard.lock().expect("blackboard lock poisoned");
            crate::blackboard_context(&bb)
        };
        let envelope = envelopes.get(&agent.id).cloned().unwrap_or_else(|| Envelope::create(BudgetPreset::Low, now_ms));
        let task_result = run_agent(agent, task_description, &context, deps, &envelope, now_ms).await;
        {
            let mut bb = blackboard.lock().expect("blackboard lock poisoned");
            crate::write_agent_result(&mut bb, &agent.id, &task_result, now_ms);
        }
        results.push(AgentRunResult { agent_id: agent.id.clone(), task_result });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use task_constitution::Constitution;
    use task_providers::{FinishReason, ModelRequest, ModelResponse, Provider, ProviderError, TokenUsage};
    use task_router::{ProviderBinding, ProviderTable};
    use task_tools::ToolRegistry;
    use task_types::{BudgetPreset as Preset, ExecutionMode};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let content = if n == 1 {
                r#"{"action":"final","text":"fail"}"#.to_string()
            } else {
                r#"{"action":"final","text":"ok"}"#.to_string()
            };
            Ok(ModelResponse {
                content,
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

    #[tokio::test]
    async fn failure_does_not_halt_the_pipeline() {
        let agents = vec![agent("a"), agent("b"), agent("c")];
        let table = table();
        let slm = CountingProvider { calls: AtomicUsize::new(0) };
        let llm = CountingProvider { calls: AtomicUsize::new(0) };
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let deps = CrewDeps { table: &table, slm: &slm, llm: &llm, registry: &registry, constitution: &constitution };
        let parent = Envelope::create(Preset::High, 0);
        let envelopes = crate::budget_alloc::allocate(&agents, &parent);
        let blackboard = Arc::new(Mutex::new(Blackboard::new()));

        let results = run(&deps, &agents, "do the thing", &blackboard, &envelopes, 0).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].task_result.result.as_deref(), Some("fail"));
    }
}
