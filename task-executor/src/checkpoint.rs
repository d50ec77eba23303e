//! Periodic on-track checks during long executions (`checkpoint` phase).

use crate::json_parse::parse_tolerant;
use serde::Deserialize;
use task_budget::Envelope;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};
use task_types::{StepResult, SuccessCriterion};

const CHECKPOINT_PROMPT: &str = "You are monitoring an in-progress automation task. Given the \
goal, its success criteria, and a compressed history of steps executed so far, decide whether \
execution is still on track. Respond with exactly one JSON object: {\"on_track\": <bool>, \
\"reason\": <string>}.";

#[derive(Debug, Deserialize)]
struct CheckpointOutput {
    on_track: bool,
}

/// Ask the SLM whether execution looks on track. Any provider failure or
/// unparseable response defaults to `true` — a checkpoint is a cheap sanity
/// check, not a hard gate, so it degrades the same way the rest of the
/// planner-side model calls do.
pub(crate) async fn is_on_track(
    slm: &dyn Provider,
    model: &str,
    envelope: &Envelope,
    goal: &str,
    criteria: &[SuccessCriterion],
    history: &[StepResult],
) -> bool {
    let criteria_block: String = criteria.iter().map(|c| format!("- {}\n", c.description)).collect();
    let user = format!(
        "Goal: {goal}\nSuccess criteria:\n{criteria_block}Execution history:\n{}",
        compress_history(history),
    );
    let request = ModelRequest {
        model: model.to_string(),
        provider: String::new(),
        tier: Tier::Slm,
        system: CHECKPOINT_PROMPT.to_string(),
        messages: vec![RequestMessage { role: Role::User, content: user }],
        response_format: ResponseFormat::Json,
        temperature: 0.0,
    };
    match slm.chat(request).await {
        Ok(response) => {
            envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
            envelope.deduct_cost(response.cost_usd);
            parse_tolerant::<CheckpointOutput>(&response.content).map(|c| c.on_track).unwrap_or(true)
        }
        Err(err) => {
            tracing::warn!(error = %err, "task.executor.checkpoint_call_failed");
            true
        }
    }
}

/// First two steps, then a summary of the middle, then the last three —
/// keeps the prompt small on tasks with dozens of steps.
fn compress_history(history: &[StepResult]) -> String {
    if history.len() <= 5 {
        return history.iter().map(line).collect();
    }
    let tail_start = history.len() - 3;
    let middle = &history[2..tail_start];
    let ok = middle.iter().filter(|r| r.success).count();
    let failed = middle.len() - ok;

    let mut out = String::new();
    for result in &history[..2] {
        out.push_str(&line(result));
    }
    out.push_str(&format!("... {} steps ({ok} ok, {failed} failed) ...\n", middle.len()));
    for result in &history[tail_start..] {
        out.push_str(&line(result));
    }
    out
}

fn line(result: &StepResult) -> String {
    format!("{}: {}\n", result.tool_name, if result.success { "ok" } else { "failed" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use task_providers::{FinishReason, ModelResponse, ProviderError, TokenUsage};
    use task_types::{BudgetPreset, DurationMs};

    struct StubProvider {
        content: String,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            Ok(ModelResponse {
                content: self.content.clone(),
                model: request.model,
                provider: "stub".to_string(),
                tier: request.tier,
                token_usage: TokenUsage::default(),
                latency_ms: 1,
                cost_usd: Default::default(),
                finish_reason: FinishReason::Stop,
            })
        }
    }

    fn history(n: usize) -> Vec<StepResult> {
        (0..n).map(|i| StepResult::success(i, "browser_click", BTreeMap::new(), Value::Null, DurationMs::ZERO)).collect()
    }

    #[tokio::test]
    async fn well_formed_response_is_trusted() {
        let provider = StubProvider { content: r#"{"on_track": false, "reason": "stuck"}"#.to_string() };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let on_track = is_on_track(&provider, "small", &envelope, "book a flight", &[], &history(2)).await;
        assert!(!on_track);
    }

    #[tokio::test]
    async fn unparseable_response_defaults_on_track() {
        let provider = StubProvider { content: "garbage".to_string() };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let on_track = is_on_track(&provider, "small", &envelope, "book a flight", &[], &history(1)).await;
        assert!(on_track);
    }

    #[test]
    fn long_history_compresses_the_middle() {
        let compressed = compress_history(&history(10));
        assert!(compressed.contains("5 steps (5 ok, 0 failed)"));
    }
}
