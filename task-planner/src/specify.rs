//! `specifyTask` — extracts goal/constraints/success criteria from the raw
//! description. Must never fail the task: any parse or model failure falls
//! back to [`TaskSpec::fallback`].

use crate::json_parse::parse_tolerant;
use task_budget::Envelope;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};
use task_types::TaskSpec;

const SPECIFY_PROMPT: &str = "Extract a one-sentence goal, a list of constraints, \
and a list of success criteria from the task description. Respond with exactly \
one JSON object: {\"goal\": <string>, \"constraints\": [<string>...], \
\"success_criteria\": [{\"description\": <string>, \"type\": \
\"output_contains\"|\"tool_succeeded\"|\"page_state\"|\"file_exists\"|\"custom\", \
\"check\": {}}...]}.";

/// Extract a [`TaskSpec`] from `description`, falling back to a safe default
/// on any model or parse failure.
pub async fn specify_task(
    provider: &dyn Provider,
    model: &str,
    description: &str,
    envelope: &Envelope,
) -> TaskSpec {
    let request = ModelRequest {
        model: model.to_string(),
        provider: String::new(),
        tier: Tier::Slm,
        system: SPECIFY_PROMPT.to_string(),
        messages: vec![RequestMessage { role: Role::User, content: description.to_string() }],
        response_format: ResponseFormat::Json,
        temperature: 0.0,
    };
    match provider.chat(request).await {
        Ok(response) => {
            envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
            envelope.deduct_cost(response.cost_usd);
            parse_tolerant::<TaskSpec>(&response.content).unwrap_or_else(|| TaskSpec::fallback(description))
        }
        Err(err) => {
            tracing::warn!(error = %err, "task.planner.specify_failed");
            TaskSpec::fallback(description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use task_providers::{FinishReason, ModelResponse, ProviderError, TokenUsage};
    use task_types::BudgetPreset;

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

    #[tokio::test]
    async fn unparseable_output_falls_back_safely() {
        let provider = StubProvider { content: "not json".to_string() };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let spec = specify_task(&provider, "small", "book a flight", &envelope).await;
        assert_eq!(spec.goal, "book a flight");
        assert_eq!(spec.success_criteria.len(), 1);
    }

    #[tokio::test]
    async fn well_formed_output_is_used_directly() {
        let provider = StubProvider {
            content: r#"{"goal":"buy milk","constraints":["budget under $5"],"success_criteria":[]}"#.to_string(),
        };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let spec = specify_task(&provider, "small", "go get milk", &envelope).await;
        assert_eq!(spec.goal, "buy milk");
        assert_eq!(spec.constraints, vec!["budget under $5".to_string()]);
    }
}
