//! Combining per-agent results into one final crew output.

use task_budget::Envelope;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role};
use task_router::{route, Operation, ProviderTable};
use task_types::{AgentRunResult, AggregationMode};

fn concat(results: &[AgentRunResult]) -> String {
    results
        .iter()
        .map(|r| format!("[{}]\n{}", r.agent_id, r.task_result.result.clone().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn last(results: &[AgentRunResult]) -> String {
    results.last().and_then(|r| r.task_result.result.clone()).unwrap_or_default()
}

/// Combine `results` per `mode`. `Custom` routes to a model with
/// `aggregation_prompt` over the concatenated results, falling back to
/// [`concat`] on a missing prompt, provider failure, or parse issue.
pub(crate) async fn aggregate(
    mode: AggregationMode,
    aggregation_prompt: Option<&str>,
    results: &[AgentRunResult],
    table: &ProviderTable,
    llm: &dyn Provider,
    envelope: &Envelope,
) -> String {
    match mode {
        AggregationMode::Concat => concat(results),
        AggregationMode::Last => last(results),
        AggregationMode::Custom => {
            let Some(prompt) = aggregation_prompt else { return concat(results) };
            let decision = route(table, Operation::Synthesize, 0.5, envelope);
            let request = ModelRequest {
                model: decision.model,
                provider: decision.provider,
                tier: decision.tier,
                system: prompt.to_string(),
                messages: vec![RequestMessage { role: Role::User, content: concat(results) }],
                response_format: ResponseFormat::Text,
                temperature: 0.3,
            };
            match llm.chat(request).await {
                Ok(response) => {
                    envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
                    envelope.deduct_cost(response.cost_usd);
                    envelope.deduct_latency_tick(response.latency_ms);
                    if response.content.trim().is_empty() {
                        concat(results)
                    } else {
                        response.content
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "task.crew.custom_aggregation_failed");
                    concat(results)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_budget::Envelope;
    use task_trace::TraceLogger;
    use task_types::{BudgetPreset, TaskId, TaskResult, TaskStatus};

    fn result(agent_id: &str, text: &str) -> AgentRunResult {
        let envelope = Envelope::create(BudgetPreset::Low, 0);
        let trace = TraceLogger::new(&TaskId::new(agent_id.to_string()));
        let finished_trace = trace.finish();
        AgentRunResult {
            agent_id: agent_id.to_string(),
            task_result: TaskResult {
                id: agent_id.to_string(),
                task_id: agent_id.to_string(),
                trace_id: finished_trace.id.clone(),
                status: TaskStatus::Completed,
                result: Some(text.to_string()),
                step_results: Vec::new(),
                budget_usage: envelope.usage(),
                trace: finished_trace,
                spec: None,
                criteria_results: Vec::new(),
                simulation_result: None,
                efficiency_report: None,
                error: None,
                completed_at: 0,
            },
        }
    }

    #[test]
    fn concat_labels_each_agent() {
        let results = vec![result("a", "one"), result("b", "two")];
        let text = concat(&results);
        assert!(text.contains("[a]\none"));
        assert!(text.contains("[b]\ntwo"));
    }

    #[test]
    fn last_returns_only_the_final_agent() {
        let results = vec![result("a", "one"), result("b", "two")];
        assert_eq!(last(&results), "two");
    }
}
