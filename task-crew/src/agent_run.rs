//! Dispatches one agent to direct or full execution, behind a tool
//! registry scoped to its `allowed_tools`, with output-schema validation
//! and exponential-backoff retry.

use std::ops::Deref;
use std::time::Duration;
use task_budget::Envelope;
use task_constitution::Constitution;
use task_providers::Provider;
use task_router::ProviderTable;
use task_tools::ToolRegistry;
use task_types::{AgentDefinition, ExecutionMode, TaskResult, TaskStatus};

use crate::{direct, full};

const DEFAULT_RETRIES: u32 = 2;

/// Everything every crew strategy needs to run an agent, bundled the way
/// `task-executor::ExecutorDeps` bundles its own dependencies.
pub struct CrewDeps<'a> {
    pub table: &'a ProviderTable,
    pub slm: &'a dyn Provider,
    pub llm: &'a dyn Provider,
    pub registry: &'a ToolRegistry,
    pub constitution: &'a Constitution,
}

enum ScopedRegistry<'a> {
    Borrowed(&'a ToolRegistry),
    Owned(ToolRegistry),
}

impl Deref for ScopedRegistry<'_> {
    type Target = ToolRegistry;
    fn deref(&self) -> &ToolRegistry {
        match self {
            ScopedRegistry::Borrowed(registry) => registry,
            ScopedRegistry::Owned(registry) => registry,
        }
    }
}

fn scope_registry<'a>(full: &'a ToolRegistry, allowed: &Option<Vec<String>>) -> ScopedRegistry<'a> {
    match allowed {
        Some(names) => ScopedRegistry::Owned(full.filtered(names)),
        None => ScopedRegistry::Borrowed(full),
    }
}

fn required_keys(schema: &serde_json::Value) -> Vec<String> {
    schema.as_object().map(|object| object.keys().cloned().collect()).unwrap_or_default()
}

fn output_satisfies_schema(result: &TaskResult, schema: &serde_json::Value) -> bool {
    let Some(text) = &result.result else { return false };
    let Some(value) = crate::json_parse::parse_tolerant::<serde_json::Value>(text) else { return false };
    let Some(object) = value.as_object() else { return false };
    required_keys(schema).iter().all(|key| object.contains_key(key))
}

fn is_budget_related(result: &TaskResult) -> bool {
    matches!(result.status, TaskStatus::BudgetExhausted)
        || result.error.as_deref().map(|e| e.contains("budget") || e.contains("Budget")).unwrap_or(false)
}

/// Run one agent to completion, retrying on output-schema validation
/// failure with exponential backoff (base 1s, doubling), up to
/// `agent.max_retries` (default 2). Never retries a budget-related failure.
pub(crate) async fn run_agent(
    agent: &AgentDefinition,
    task_description: &str,
    blackboard_context: &str,
    deps: &CrewDeps<'_>,
    envelope: &Envelope,
    now_ms: u64,
) -> TaskResult {
    let scoped = scope_registry(deps.registry, &agent.allowed_tools);
    let max_retries = agent.max_retries.unwrap_or(DEFAULT_RETRIES);

    let mut attempt = 0u32;
    loop {
        let result = match agent.execution_mode {
            ExecutionMode::Direct => {
                direct::run(
                    agent,
                    task_description,
                    blackboard_context,
                    deps.table,
                    deps.slm,
                    &scoped,
                    deps.constitution,
                    envelope,
                    now_ms,
                )
                .await
            }
            ExecutionMode::Full => {
                full::run(
                    agent,
                    task_description,
                    blackboard_context,
                    deps.table,
                    deps.slm,
                    deps.llm,
                    &scoped,
                    deps.constitution,
                    envelope,
                    now_ms,
                )
                .await
            }
        };

        let schema_satisfied = match &agent.output_schema {
            Some(schema) => output_satisfies_schema(&result, schema),
            None => true,
        };
        if schema_satisfied || attempt >= max_retries || is_budget_related(&result) {
            return result;
        }

        tracing::info!(agent = %agent.id, attempt, "task.crew.output_schema_retry");
        tokio::time::sleep(Duration::from_millis(1000 * 2u64.pow(attempt))).await;
        attempt += 1;
    }
}
