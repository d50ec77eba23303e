//! `plan` — the main planning operation: prompt assembly, a single model
//! call at the router-chosen tier, tolerant JSON parsing, the three
//! escalation paths, and plan enrichment.

use crate::classify::action_floor;
use crate::heuristic::heuristic_fallback;
use crate::json_parse::parse_tolerant;
use serde::Deserialize;
use std::collections::BTreeMap;
use task_budget::Envelope;
use task_constitution::Constitution;
use task_providers::{
    ModelRequest, ModelResponse, Provider, ProviderError, RequestMessage, ResponseFormat, Role,
    Tier,
};
use task_router::{route, Operation, ProviderTable};
use task_tools::ToolRegistry;
use task_trace::TraceLogger;
use task_types::{ExecutionPlan, PlanStep, SpanId, SuccessCriterion, TraceEvent};

/// Everything `plan` needs to reach outside this crate, bundled so call
/// sites don't thread eight parameters through every helper.
pub struct PlanDeps<'a> {
    /// Which (provider, model) serves each tier.
    pub table: &'a ProviderTable,
    /// The SLM-tier provider.
    pub slm: &'a dyn Provider,
    /// The LLM-tier provider.
    pub llm: &'a dyn Provider,
    /// The task's budget envelope; model calls deduct from it directly.
    pub envelope: &'a Envelope,
    /// The tool catalogue, for prompt assembly and enrichment checks.
    pub registry: &'a ToolRegistry,
    /// The active rule set, for prompt injection.
    pub constitution: &'a Constitution,
    /// Where planning events are recorded.
    pub trace: &'a TraceLogger,
    /// The span planning activity nests under.
    pub span: &'a SpanId,
}

fn provider_for<'a>(deps: &PlanDeps<'a>, tier: Tier) -> &'a dyn Provider {
    match tier {
        Tier::Slm => deps.slm,
        Tier::Llm => deps.llm,
    }
}

async fn call_model(
    deps: &PlanDeps<'_>,
    tier: Tier,
    model: String,
    system: String,
    user: String,
) -> Result<ModelResponse, ProviderError> {
    let request = ModelRequest {
        model,
        provider: String::new(),
        tier,
        system,
        messages: vec![RequestMessage { role: Role::User, content: user }],
        response_format: ResponseFormat::Json,
        temperature: 0.2,
    };
    let response = provider_for(deps, tier).chat(request).await?;
    deps.envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
    deps.envelope.deduct_cost(response.cost_usd);
    deps.envelope.deduct_latency_tick(response.latency_ms);
    Ok(response)
}

fn build_system_prompt(
    deps: &PlanDeps<'_>,
    failure_context: Option<&str>,
    success_criteria: &[SuccessCriterion],
) -> String {
    let mut prompt = String::from(
        "You are a task planner. Produce a JSON object {\"steps\": [{\"description\": \
         <string>, \"tool_name\": <string>, \"tool_args\": {..}}...]} using only the tools \
         listed below. An empty steps array means the task needs no tool calls.\n\nTools:\n",
    );
    for tool in deps.registry.iter() {
        prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
    }
    if let Some(failure) = failure_context {
        prompt.push_str("\nPrevious attempt failed:\n");
        prompt.push_str(failure);
        prompt.push('\n');
    }
    if !success_criteria.is_empty() {
        prompt.push_str("\nSuccess criteria:\n");
        for criterion in success_criteria {
            prompt.push_str(&format!("- {}\n", criterion.description));
        }
    }
    let injection = deps.constitution.build_prompt_injection();
    if !injection.is_empty() {
        prompt.push('\n');
        prompt.push_str(&injection);
    }
    prompt
}

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

fn to_plan_steps(raw: Vec<RawStep>) -> Vec<PlanStep> {
    raw.into_iter()
        .enumerate()
        .map(|(i, step)| PlanStep::new(i, step.description, step.tool_name, step.tool_args))
        .collect()
}

fn record_routing(deps: &PlanDeps<'_>, operation: &str, tier: Tier, provider: &str, model: &str, reason: &str) {
    deps.trace.record_event(
        deps.span,
        TraceEvent::RoutingDecision {
            operation: operation.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            tier: if tier == Tier::Slm { "slm" } else { "llm" }.to_string(),
            reason: reason.to_string(),
        },
    );
}

/// Build an [`ExecutionPlan`] for `description`, at the tier the router
/// chooses for `complexity`, escalating through the three documented paths
/// when the SLM result is unusable.
pub async fn plan(
    deps: &PlanDeps<'_>,
    task_id: &str,
    description: &str,
    complexity: f64,
    success_criteria: &[SuccessCriterion],
    failure_context: Option<&str>,
) -> ExecutionPlan {
    let floor = action_floor(description);
    let decision = route(deps.table, Operation::Plan, complexity, deps.envelope);
    record_routing(deps, "plan", decision.tier, &decision.provider, &decision.model, &decision.reason);

    let system = build_system_prompt(deps, failure_context, success_criteria);
    let first = call_model(deps, decision.tier, decision.model.clone(), system.clone(), description.to_string()).await;

    let mut parsed = match &first {
        Ok(response) => parse_tolerant::<RawPlanResponse>(&response.content),
        Err(_) => None,
    };

    if parsed.is_none() && floor > 0.0 && deps.envelope.can_afford_escalation() {
        let escalated = task_router::escalate(deps.table, deps.envelope, "plan parse failure");
        deps.trace.record_event(deps.span, TraceEvent::Escalation { reason: "parse failure".to_string() });
        record_routing(deps, "plan", escalated.tier, &escalated.provider, &escalated.model, &escalated.reason);
        if let Ok(response) = call_model(deps, escalated.tier, escalated.model, system.clone(), description.to_string()).await {
            parsed = parse_tolerant::<RawPlanResponse>(&response.content);
        }
    }

    let mut steps = parsed.map(|raw| to_plan_steps(raw.steps)).unwrap_or_default();

    if steps.is_empty() && floor > 0.0 && deps.envelope.can_afford_escalation() {
        let escalated = task_router::escalate(deps.table, deps.envelope, "empty plan");
        deps.trace.record_event(deps.span, TraceEvent::Escalation { reason: "empty plan".to_string() });
        record_routing(deps, "plan", escalated.tier, &escalated.provider, &escalated.model, &escalated.reason);
        if let Ok(response) = call_model(deps, escalated.tier, escalated.model, system, description.to_string()).await {
            if let Some(raw) = parse_tolerant::<RawPlanResponse>(&response.content) {
                steps = to_plan_steps(raw.steps);
            }
        }
    }

    if steps.is_empty() {
        if let Some(fallback_steps) = heuristic_fallback(description, deps.registry) {
            steps = fallback_steps;
        }
    }

    let mut execution_plan = ExecutionPlan { task_id: task_id.to_string(), complexity, steps };
    enrich(&mut execution_plan, floor, deps.registry);
    execution_plan
}

/// If the plan is exactly one `browser_navigate` step and the task clearly
/// needed real action, append a page-observation step so reactive planning
/// has structure to work with.
fn enrich(plan: &mut ExecutionPlan, action_floor: f64, registry: &ToolRegistry) {
    let is_lone_navigate = plan.steps.len() == 1 && plan.steps[0].tool_name == "browser_navigate";
    if is_lone_navigate && action_floor >= 0.7 && registry.get("browser_observe").is_some() {
        plan.steps.push(PlanStep::new(1, "observe the page", "browser_observe", BTreeMap::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use task_providers::{FinishReason, TokenUsage};
    use task_tools::{ToolDyn, ToolSchema};
    use task_types::{BudgetPreset, TaskId};

    struct StubTool(&'static str);
    impl ToolDyn for StubTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "stub tool"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::any()
        }
        fn execute(
            &self,
            input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send + '_>> {
            Box::pin(async move { Ok(input) })
        }
    }

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
                token_usage: TokenUsage { prompt_tokens: 10, completion_tokens: 10, total_tokens: 20 },
                latency_ms: 5,
                cost_usd: Decimal::new(1, 3),
                finish_reason: FinishReason::Stop,
            })
        }
    }

    fn table() -> ProviderTable {
        let mut table = ProviderTable::new();
        table.register(Tier::Slm, task_router::ProviderBinding {
            provider: "ollama".to_string(),
            model: "small".to_string(),
            cost_per_1k_tokens: Decimal::new(1, 3),
        });
        table.register(Tier::Llm, task_router::ProviderBinding {
            provider: "anthropic".to_string(),
            model: "big".to_string(),
            cost_per_1k_tokens: Decimal::new(15, 3),
        });
        table
    }

    #[tokio::test]
    async fn well_formed_plan_is_used_directly() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool("browser_navigate")));
        let slm = StubProvider {
            content: r#"{"steps":[{"description":"go","tool_name":"browser_navigate","tool_args":{"url":"https://x.com"}}]}"#.to_string(),
        };
        let llm = StubProvider { content: "{}".to_string() };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let constitution = Constitution::default();
        let trace = TraceLogger::new(&TaskId::new("t1"));
        let span = trace.root();
        let deps = PlanDeps {
            table: &table(),
            slm: &slm,
            llm: &llm,
            envelope: &envelope,
            registry: &registry,
            constitution: &constitution,
            trace: &trace,
            span: &span,
        };
        let result = plan(&deps, "t1", "go to https://x.com", 0.8, &[], None).await;
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].tool_name, "browser_navigate");
    }

    #[tokio::test]
    async fn lone_navigate_step_is_enriched_with_observe() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool("browser_navigate")));
        registry.register(Arc::new(StubTool("browser_observe")));
        let slm = StubProvider {
            content: r#"{"steps":[{"description":"go","tool_name":"browser_navigate","tool_args":{"url":"https://x.com"}}]}"#.to_string(),
        };
        let llm = StubProvider { content: "{}".to_string() };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let constitution = Constitution::default();
        let trace = TraceLogger::new(&TaskId::new("t1"));
        let span = trace.root();
        let deps = PlanDeps {
            table: &table(),
            slm: &slm,
            llm: &llm,
            envelope: &envelope,
            registry: &registry,
            constitution: &constitution,
            trace: &trace,
            span: &span,
        };
        let result = plan(&deps, "t1", "go to https://x.com", 0.8, &[], None).await;
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[1].tool_name, "browser_observe");
    }

    #[tokio::test]
    async fn empty_plan_escalates_then_falls_back_to_heuristic() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool("browser_navigate")));
        let slm = StubProvider { content: r#"{"steps":[]}"#.to_string() };
        let llm = StubProvider { content: r#"{"steps":[]}"#.to_string() };
        let envelope = Envelope::create(BudgetPreset::Medium, 0);
        let constitution = Constitution::default();
        let trace = TraceLogger::new(&TaskId::new("t1"));
        let span = trace.root();
        let deps = PlanDeps {
            table: &table(),
            slm: &slm,
            llm: &llm,
            envelope: &envelope,
            registry: &registry,
            constitution: &constitution,
            trace: &trace,
            span: &span,
        };
        let result = plan(&deps, "t1", "open https://example.com", 0.8, &[], None).await;
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].tool_name, "browser_navigate");
        assert_eq!(envelope.usage().escalations.used.to_string(), "1");
    }
}
