//! `planReactiveSteps` — after a successful `browser_*`/`os_*` step, ask
//! whether anything needs handling (a cookie banner, a login wall, the next
//! action off an observed element list) before the remaining plan resumes.

use crate::json_parse::parse_tolerant;
use serde::Deserialize;
use std::collections::BTreeMap;
use task_budget::Envelope;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};
use task_tools::ToolRegistry;
use task_types::{PlanStep, StepResult};

const REACTIVE_PROMPT: &str = "You just observed the result of one automation step. \
Decide whether any steps must run before the remaining plan continues — \
dismissing a cookie banner or login wall, or picking the next action from an \
observed element list. Respond with exactly one JSON object: {\"steps\": \
[{\"description\": <string>, \"tool_name\": <string>, \"tool_args\": {..}}...]}. \
An empty array means nothing needs to change.";

#[derive(Debug, Deserialize, Default)]
struct RawReactive {
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

fn is_reactive_eligible(tool_name: &str) -> bool {
    tool_name.starts_with("browser_") || tool_name.starts_with("os_")
}

/// Produce zero or more steps to run before the remaining plan, based on
/// `last_step`'s output and the last-known page content. Only runs for
/// `browser_*`/`os_*` steps, and only when an escalation is affordable —
/// both conditions are checked here so callers can invoke this
/// unconditionally after every successful step.
pub async fn plan_reactive_steps(
    provider: &dyn Provider,
    model: &str,
    envelope: &Envelope,
    registry: &ToolRegistry,
    last_step: &StepResult,
    page_content: Option<&str>,
) -> Vec<PlanStep> {
    if !last_step.success
        || !is_reactive_eligible(&last_step.tool_name)
        || !envelope.can_afford_escalation()
    {
        return Vec::new();
    }

    let mut user = format!(
        "Last step: {} -> {}\n",
        last_step.tool_name, last_step.output
    );
    if let Some(page) = page_content {
        user.push_str("Page content:\n");
        user.push_str(page);
    }

    let request = ModelRequest {
        model: model.to_string(),
        provider: String::new(),
        tier: Tier::Llm,
        system: REACTIVE_PROMPT.to_string(),
        messages: vec![RequestMessage { role: Role::User, content: user }],
        response_format: ResponseFormat::Json,
        temperature: 0.2,
    };

    let response = match provider.chat(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "task.planner.reactive_failed");
            return Vec::new();
        }
    };
    envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
    envelope.deduct_cost(response.cost_usd);

    let Some(raw) = parse_tolerant::<RawReactive>(&response.content) else {
        return Vec::new();
    };

    raw.steps
        .into_iter()
        .filter(|step| registry.get(&step.tool_name).is_some())
        .enumerate()
        .map(|(i, step)| PlanStep::new(i, step.description, step.tool_name, step.tool_args))
        .collect()
}
