//! `replan` — recovery planning after a step fails. Always LLM tier,
//! always consumes one escalation, bounded by a replan-depth limit so a
//! persistently failing task can't loop forever.

use crate::json_parse::parse_tolerant;
use crate::plan::PlanDeps;
use serde::Deserialize;
use std::collections::BTreeMap;
use task_router::escalate;
use task_types::{PlanStep, TraceEvent};

/// Default maximum number of replans per task.
pub const DEFAULT_MAX_REPLAN_DEPTH: u32 = 2;

const REPLAN_PROMPT: &str = "A step in an in-progress plan failed. Produce a replacement \
for the remaining steps, taking the failure into account. Respond with exactly one JSON \
object: {\"steps\": [{\"description\": <string>, \"tool_name\": <string>, \"tool_args\": \
{..}}...]}. An empty array means abandon the remaining plan.";

#[derive(Debug, Deserialize, Default)]
struct RawPlanResponse {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    description: String,
    tool_name: String,
    #[serde(default)]
    tool_args: BTreeMap<String, serde_json::Value>,
}

/// Attempt recovery planning for `failed_step`. Returns `None` when
/// recovery isn't attempted at all (depth exhausted, no budget for another
/// escalation) or when the LLM's response can't be parsed into a plan —
/// both cases the caller treats as "replanning did not help".
pub async fn replan(
    deps: &PlanDeps<'_>,
    original_description: &str,
    failed_step: &PlanStep,
    error: &str,
    completed_summary: &str,
    depth: u32,
) -> Option<Vec<PlanStep>> {
    if depth >= DEFAULT_MAX_REPLAN_DEPTH || !deps.envelope.can_afford_escalation() {
        return None;
    }

    let decision = escalate(deps.table, deps.envelope, "step failure recovery");
    deps.trace.record_event(
        deps.span,
        TraceEvent::Replan { failed_step_index: failed_step.index, depth: depth + 1 },
    );

    let user = format!(
        "Original task: {original_description}\n\
         Failed step: {} ({})\n\
         Error: {error}\n\
         Completed so far:\n{completed_summary}",
        failed_step.description, failed_step.tool_name,
    );

    let request = task_providers::ModelRequest {
        model: decision.model,
        provider: String::new(),
        tier: task_providers::Tier::Llm,
        system: REPLAN_PROMPT.to_string(),
        messages: vec![task_providers::RequestMessage { role: task_providers::Role::User, content: user }],
        response_format: task_providers::ResponseFormat::Json,
        temperature: 0.2,
    };

    let response = match deps.llm.chat(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "task.planner.replan_call_failed");
            return None;
        }
    };
    deps.envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
    deps.envelope.deduct_cost(response.cost_usd);

    let raw = parse_tolerant::<RawPlanResponse>(&response.content)?;
    Some(
        raw.steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| PlanStep::new(failed_step.index + i, step.description, step.tool_name, step.tool_args))
            .collect(),
    )
}
