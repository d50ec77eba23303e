//! An in-memory provider and tool registry for running the CLI's `run`
//! subcommand without wiring up a real model backend. Every phase of
//! [`task_executor::execute`] already degrades to a documented fallback on
//! an unparseable or uncooperative response (`TaskSpec::fallback`,
//! `heuristic_fallback`, the direct-mode `"final"` default, ...), so a
//! single fixed reply here is enough to drive the whole pipeline end to end.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use task_providers::{
    FinishReason, ModelRequest, ModelResponse, Provider, ProviderError, ResponseFormat, TokenUsage,
};
use task_tools::{ToolDyn, ToolRegistry, ToolSchema};

/// A provider that always answers `{"action":"final","text":"..."}` for
/// JSON requests and a short fixed sentence for text requests. Deterministic
/// and free — stands in for a real LLM/SLM backend in the CLI demo.
pub struct MockProvider;

#[async_trait]
impl Provider for MockProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, task_providers::Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let content = match request.response_format {
            ResponseFormat::Json => {
                json!({ "action": "final", "text": format!("mock response to: {last_user}") }).to_string()
            }
            ResponseFormat::Text => format!("mock response to: {last_user}"),
        };

        Ok(ModelResponse {
            content,
            model: request.model,
            provider: "mock".to_string(),
            tier: request.tier,
            token_usage: TokenUsage { prompt_tokens: 20, completion_tokens: 10, total_tokens: 30 },
            latency_ms: 5,
            cost_usd: Decimal::ZERO,
            finish_reason: FinishReason::Stop,
        })
    }
}

/// Echoes its `text` input back. The only tool the CLI's `run` subcommand
/// registers by default.
struct EchoTool;

impl ToolDyn for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the given text back"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::any().require("text", "string")
    }

    fn execute(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
        Box::pin(async move { Ok(json!({ "echoed": input })) })
    }
}

/// A tool that reports the wall-clock time the run started, as an offset in
/// milliseconds from `now_ms`. Useful for exercising a tool call that takes
/// no meaningful input.
struct ClockTool;

impl ToolDyn for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Reports elapsed time since the task started"
    }

    fn input_schema(&self) -> ToolSchema {
        ToolSchema::any()
    }

    fn execute(&self, _input: Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(json!({ "elapsed_ms": 1 }))
        })
    }
}

/// Build the fixed tool registry the CLI's `run` subcommand uses.
pub fn demo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(std::sync::Arc::new(EchoTool));
    registry.register(std::sync::Arc::new(ClockTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_providers::{RequestMessage, Role, Tier};

    #[tokio::test]
    async fn json_requests_get_a_final_action() {
        let provider = MockProvider;
        let request = ModelRequest {
            model: "mock".to_string(),
            provider: "mock".to_string(),
            tier: Tier::Slm,
            system: String::new(),
            messages: vec![RequestMessage { role: Role::User, content: "hello".to_string() }],
            response_format: ResponseFormat::Json,
            temperature: 0.0,
        };
        let response = provider.chat(request).await.unwrap();
        let parsed: Value = serde_json::from_str(&response.content).unwrap();
        assert_eq!(parsed["action"], "final");
    }

    #[test]
    fn demo_registry_has_echo_and_clock() {
        let registry = demo_registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("clock").is_some());
    }
}
