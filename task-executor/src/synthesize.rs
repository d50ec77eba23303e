//! Final answer synthesis (`synthesize` phase) and output filtering.

use task_budget::Envelope;
use task_constitution::Constitution;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};
use task_router::{route_synthesize, ProviderTable, RoutingDecision};
use task_types::{ChatRole, StepResult, Task, TaskError};

const SYNTHESIZE_PROMPT: &str = "You are completing a task for a user. Using the conversation \
so far, and the steps that were executed (if any), produce the final answer text. Be concise \
and direct; don't describe your own process unless asked to.";

const FILTERED_NOTICE: &str = "[Response filtered: violated a constitution output rule]";

fn to_request_role(role: ChatRole) -> Role {
    match role {
        ChatRole::User => Role::User,
        ChatRole::Assistant => Role::Assistant,
        ChatRole::System => Role::System,
    }
}

fn summarize_steps(steps: &[StepResult]) -> String {
    steps
        .iter()
        .map(|s| {
            let outcome = if s.success { s.output.to_string() } else { s.error.clone().unwrap_or_default() };
            format!("{}. {} -> {outcome}\n", s.step_index, s.tool_name)
        })
        .collect()
}

/// Route, call the model, and pass the result through the constitution's
/// output guard. Fails only when the provider call errors *and* no steps
/// succeeded to assemble a fallback answer from.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn synthesize(
    table: &ProviderTable,
    slm: &dyn Provider,
    llm: &dyn Provider,
    envelope: &Envelope,
    constitution: &Constitution,
    task: &Task,
    complexity: f64,
    any_step_failed: bool,
    steps: &[StepResult],
) -> Result<(String, RoutingDecision), TaskError> {
    let decision = route_synthesize(table, complexity, any_step_failed, envelope);
    let provider = match decision.tier {
        Tier::Llm => llm,
        Tier::Slm => slm,
    };

    let user_content = if steps.is_empty() {
        task.description.clone()
    } else {
        format!("{}\n\nSteps executed:\n{}", task.description, summarize_steps(steps))
    };

    let mut messages: Vec<RequestMessage> = task
        .messages
        .iter()
        .map(|m| RequestMessage { role: to_request_role(m.role), content: m.content.clone() })
        .collect();
    messages.push(RequestMessage { role: Role::User, content: user_content });

    let request = ModelRequest {
        model: decision.model.clone(),
        provider: decision.provider.clone(),
        tier: decision.tier,
        system: SYNTHESIZE_PROMPT.to_string(),
        messages,
        response_format: ResponseFormat::Text,
        temperature: 0.3,
    };

    let text = match provider.chat(request).await {
        Ok(response) => {
            envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
            envelope.deduct_cost(response.cost_usd);
            envelope.deduct_latency_tick(response.latency_ms);
            response.content
        }
        Err(err) => {
            if steps.iter().any(|s| s.success) {
                tracing::warn!(error = %err, "task.executor.synthesis_call_failed_falling_back_to_step_outputs");
                steps.iter().filter(|s| s.success).map(|s| s.output.to_string()).collect::<Vec<_>>().join("\n")
            } else {
                return Err(TaskError::Provider(err.to_string()));
            }
        }
    };

    let final_text = match constitution.validate_output(&text) {
        Some(violation) => {
            tracing::warn!(rule_id = %violation.rule_id, "task.executor.output_filtered");
            FILTERED_NOTICE.to_string()
        }
        None => text,
    };

    Ok((final_text, decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use task_budget::Envelope;
    use task_providers::{FinishReason, ModelResponse, ProviderError, TokenUsage};
    use task_router::ProviderBinding;
    use task_types::BudgetPreset;

    struct StubProvider {
        content: String,
        fail: bool,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::RequestFailed("down".to_string()));
            }
            Ok(ModelResponse {
                content: self.content.clone(),
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
        table.register(task_providers::Tier::Slm, ProviderBinding {
            provider: "local".to_string(),
            model: "small".to_string(),
            cost_per_1k_tokens: Decimal::new(1, 3),
        });
        table.register(task_providers::Tier::Llm, ProviderBinding {
            provider: "anthropic".to_string(),
            model: "big".to_string(),
            cost_per_1k_tokens: Decimal::new(15, 3),
        });
        table
    }

    #[tokio::test]
    async fn direct_answer_with_zero_steps() {
        let slm = StubProvider { content: "Hello!".to_string(), fail: false };
        let llm = StubProvider { content: "unused".to_string(), fail: false };
        let envelope = Envelope::create(BudgetPreset::Low, 0);
        let constitution = Constitution::default();
        let task = Task::new("t1", "Hi", 0);
        let (text, _) = synthesize(&table(), &slm, &llm, &envelope, &constitution, &task, 0.1, false, &[]).await.unwrap();
        assert_eq!(text, "Hello!");
    }

    #[tokio::test]
    async fn provider_failure_with_no_successful_steps_is_fatal() {
        let slm = StubProvider { content: String::new(), fail: true };
        let llm = StubProvider { content: String::new(), fail: true };
        let envelope = Envelope::create(BudgetPreset::Low, 0);
        let constitution = Constitution::default();
        let task = Task::new("t1", "Hi", 0);
        let result = synthesize(&table(), &slm, &llm, &envelope, &constitution, &task, 0.1, false, &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn output_violating_constitution_is_filtered() {
        let slm = StubProvider { content: "Don't worry, I am a real human just like you.".to_string(), fail: false };
        let llm = StubProvider { content: "unused".to_string(), fail: false };
        let envelope = Envelope::create(BudgetPreset::Low, 0);
        let constitution = Constitution::default();
        let task = Task::new("t1", "are you an AI?", 0);
        let (text, _) = synthesize(&table(), &slm, &llm, &envelope, &constitution, &task, 0.1, false, &[]).await.unwrap();
        assert_eq!(text, FILTERED_NOTICE);
    }
}
