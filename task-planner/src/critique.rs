//! `critiquePlan` — an LLM pass that scores a plan's confidence per step
//! and flags issues before the executor commits to it.

use crate::json_parse::parse_tolerant;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};
use task_types::{ExecutionPlan, PlanScore};

const CRITIQUE_PROMPT: &str = "You are reviewing a proposed plan before execution. \
Respond with exactly one JSON object: {\"overall\": <0..1>, \"step_confidences\": \
[<0..1>...], \"issues\": [<string>...], \"refined_plan\": <plan object or null>}. \
`step_confidences` must have one entry per step, in order.";

fn summarize(plan: &ExecutionPlan) -> String {
    let mut summary = String::new();
    for step in &plan.steps {
        summary.push_str(&format!("{}. {} ({})\n", step.index, step.description, step.tool_name));
    }
    summary
}

/// Score `plan`'s confidence with an LLM call, falling back to a neutral
/// score if the response can't be parsed.
pub async fn critique_plan(provider: &dyn Provider, model: &str, plan: &ExecutionPlan) -> PlanScore {
    let request = ModelRequest {
        model: model.to_string(),
        provider: String::new(),
        tier: Tier::Llm,
        system: CRITIQUE_PROMPT.to_string(),
        messages: vec![RequestMessage { role: Role::User, content: summarize(plan) }],
        response_format: ResponseFormat::Json,
        temperature: 0.0,
    };
    match provider.chat(request).await {
        Ok(response) => parse_tolerant::<PlanScore>(&response.content)
            .map(PlanScore::clamped)
            .unwrap_or_else(|| PlanScore::neutral_fallback(plan.steps.len())),
        Err(err) => {
            tracing::warn!(error = %err, "task.planner.critique_failed");
            PlanScore::neutral_fallback(plan.steps.len())
        }
    }
}
