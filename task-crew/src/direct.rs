//! Direct agent execution — a tight tool-use loop of at most three model
//! calls, no planning/critique/simulation pipeline. The model is asked to
//! return one JSON decision per turn: call a tool, or answer.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;
use task_budget::Envelope;
use task_constitution::Constitution;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};
use task_router::{route, Operation, ProviderTable};
use task_tools::ToolRegistry;
use task_types::{AgentDefinition, DurationMs, StepResult, TaskId, TaskResult, TaskStatus, TraceEvent};
use task_trace::TraceLogger;

use crate::json_parse::parse_tolerant;

const MAX_ROUNDS: u32 = 3;
const FILTERED_NOTICE: &str = "[Response filtered: violated a constitution output rule]";

#[derive(Debug, Deserialize)]
struct DirectAction {
    action: String,
    text: Option<String>,
    tool: Option<String>,
    #[serde(default)]
    args: serde_json::Value,
}

fn system_prompt(agent: &AgentDefinition) -> String {
    format!(
        "You are the \"{}\" agent in a multi-agent crew. Instructions: {}\n\n\
         Respond with exactly one JSON object per turn: either \
         {{\"action\":\"tool_call\",\"tool\":\"<tool name>\",\"args\":{{...}}}} to call a \
         tool, or {{\"action\":\"final\",\"text\":\"<answer>\"}} once you have enough \
         information to answer.",
        agent.role, agent.instructions
    )
}

fn args_as_map(value: &serde_json::Value) -> BTreeMap<String, serde_json::Value> {
    value.as_object().cloned().map(|m| m.into_iter().collect()).unwrap_or_default()
}

/// Run `agent` in direct mode against `envelope`, returning its own
/// [`TaskResult`] so direct and full agents compose uniformly under a crew.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run(
    agent: &AgentDefinition,
    task_description: &str,
    blackboard_context: &str,
    table: &ProviderTable,
    slm: &dyn Provider,
    registry: &ToolRegistry,
    constitution: &Constitution,
    envelope: &Envelope,
    now_ms: u64,
) -> TaskResult {
    let trace = TraceLogger::new(&TaskId::new(agent.id.clone()));
    let root = trace.root();
    trace.record_event(
        &root,
        TraceEvent::StateTransition { from: "idle".to_string(), to: "act".to_string() },
    );

    let system = system_prompt(agent);
    let opening = if blackboard_context.is_empty() {
        task_description.to_string()
    } else {
        format!("{task_description}\n\nShared context from other agents:\n{blackboard_context}")
    };
    let mut messages = vec![RequestMessage { role: Role::User, content: opening }];
    let mut step_results: Vec<StepResult> = Vec::new();
    let mut final_text: Option<String> = None;
    let mut error: Option<String> = None;

    'rounds: for round in 0..MAX_ROUNDS {
        if let Err(err) = envelope.check_budget() {
            error = Some(err.to_string());
            break;
        }

        let decision = route(table, Operation::Classify, 0.0, envelope);
        let request = ModelRequest {
            model: decision.model.clone(),
            provider: decision.provider.clone(),
            tier: Tier::Slm,
            system: system.clone(),
            messages: messages.clone(),
            response_format: ResponseFormat::Json,
            temperature: 0.2,
        };

        let response = match slm.chat(request).await {
            Ok(response) => {
                envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
                envelope.deduct_cost(response.cost_usd);
                envelope.deduct_latency_tick(response.latency_ms);
                response
            }
            Err(err) => {
                tracing::warn!(agent = %agent.id, error = %err, "task.crew.direct_call_failed");
                error = Some(err.to_string());
                break 'rounds;
            }
        };

        let last_round = round + 1 == MAX_ROUNDS;
        match parse_tolerant::<DirectAction>(&response.content) {
            Some(parsed) if parsed.action == "tool_call" && parsed.tool.is_some() && !last_round => {
                let tool_name = parsed.tool.expect("checked above");
                messages.push(RequestMessage { role: Role::Assistant, content: response.content });

                let started = Instant::now();
                let outcome = match registry.invoke(constitution, &tool_name, parsed.args.clone()).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error = Some(err.to_string());
                        break 'rounds;
                    }
                };
                envelope.deduct_tool_call();
                let duration = DurationMs::from_millis(started.elapsed().as_millis() as u64);
                let index = step_results.len();
                let tool_args = args_as_map(&parsed.args);
                let result = if outcome.success {
                    StepResult::success(
                        index,
                        tool_name.clone(),
                        tool_args,
                        outcome.output.clone().unwrap_or(serde_json::Value::Null),
                        duration,
                    )
                } else {
                    StepResult::failure(
                        index,
                        tool_name.clone(),
                        tool_args,
                        outcome.error.clone().unwrap_or_default(),
                        duration,
                    )
                };
                let observation =
                    if outcome.success { result.output.to_string() } else { result.error.clone().unwrap_or_default() };
                messages.push(RequestMessage { role: Role::Tool, content: observation });
                step_results.push(result);
            }
            Some(parsed) if parsed.action == "final" => {
                final_text = Some(parsed.text.unwrap_or(response.content));
                break 'rounds;
            }
            _ => {
                final_text = Some(response.content);
                break 'rounds;
            }
        }
    }

    let text = final_text.unwrap_or_else(|| fallback_text(&step_results));
    let filtered = match constitution.validate_output(&text) {
        Some(violation) => {
            tracing::warn!(agent = %agent.id, rule_id = %violation.rule_id, "task.crew.direct_output_filtered");
            FILTERED_NOTICE.to_string()
        }
        None => text,
    };

    let status = match &error {
        Some(message) if message.contains("budget exhausted") => TaskStatus::BudgetExhausted,
        Some(_) if step_results.is_empty() => TaskStatus::Failed,
        _ => TaskStatus::Completed,
    };

    trace.record_event(&root, TraceEvent::StateTransition { from: "act".to_string(), to: "done".to_string() });
    let finished_trace = trace.finish();
    TaskResult {
        id: agent.id.clone(),
        task_id: agent.id.clone(),
        trace_id: finished_trace.id.clone(),
        status,
        result: Some(filtered),
        step_results,
        budget_usage: envelope.usage(),
        trace: finished_trace,
        spec: None,
        criteria_results: Vec::new(),
        simulation_result: None,
        efficiency_report: None,
        error,
        completed_at: now_ms,
    }
}

fn fallback_text(step_results: &[StepResult]) -> String {
    step_results
        .iter()
        .filter(|r| r.success)
        .map(|r| r.output.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
