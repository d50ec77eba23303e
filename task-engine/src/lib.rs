//! # task-engine — umbrella crate and CLI for the task execution core
//!
//! Re-exports every crate in this workspace behind one name, the way
//! `neuron` re-exports its own sibling crates, and adds the one thing none
//! of them provide on their own: a runnable entry point. [`run`] wires a
//! [`config::TaskEngineConfig`] into a live [`task_executor::ExecutorDeps`]
//! (constitution plus extra rules, a provider table built from the
//! configured model map, the demo tool registry) and drives one
//! [`task_types::Task`] through [`task_executor::execute`].
//!
//! The `task-engine` binary (`src/main.rs`) is a thin argv-parsing shell
//! around this function; embedders that want the engine without a process
//! boundary call [`run`] directly.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod mock;

pub use task_budget as budget;
pub use task_constitution as constitution;
pub use task_crew as crew;
pub use task_executor as executor;
pub use task_planner as planner;
pub use task_providers as providers;
pub use task_router as router;
pub use task_simulator as simulator;
pub use task_tools as tools;
pub use task_trace as trace;
pub use task_types as types;

/// The commonly needed names from every sibling crate, for `use task_engine::prelude::*;`.
pub mod prelude {
    pub use task_budget::Envelope;
    pub use task_constitution::Constitution;
    pub use task_executor::{execute, execute_with_envelope, ExecutorDeps};
    pub use task_providers::{ModelRequest, ModelResponse, Provider, ProviderError, Tier};
    pub use task_router::{route, Operation, ProviderBinding, ProviderTable};
    pub use task_tools::{ToolDyn, ToolRegistry};
    pub use task_types::{BudgetPreset, Task, TaskResult, TaskStatus};

    pub use crate::config::TaskEngineConfig;
    pub use crate::error::EngineError;
    pub use crate::{run, RunRequest};
}

use rust_decimal::Decimal;
use task_budget::Envelope;
use task_constitution::Constitution;
use task_providers::Tier;
use task_router::{ProviderBinding, ProviderTable};
use task_types::{BudgetPreset, Task, TaskResult};

use config::TaskEngineConfig;
use error::EngineError;

/// A task submitted to [`run`]. `budget_preset` overrides
/// `config.default_budget_preset` when set.
pub struct RunRequest {
    /// Caller-assigned task identifier.
    pub task_id: String,
    /// The natural-language instruction to execute.
    pub task_description: String,
    /// Budget preset override, if the caller named one explicitly.
    pub budget_preset: Option<BudgetPreset>,
}

/// Build a [`ProviderTable`] from `config.models`: the first model mapped
/// to each tier becomes that tier's binding. A tier with no configured
/// model falls back to a fixed mock model name, since the CLI's own
/// provider (`mock::MockProvider`) answers every model name identically.
fn provider_table(config: &TaskEngineConfig) -> ProviderTable {
    let mut table = ProviderTable::new();
    for tier in [Tier::Slm, Tier::Llm] {
        let model = config
            .models
            .iter()
            .find(|(_, t)| **t == tier)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| match tier {
                Tier::Slm => "mock-small".to_string(),
                Tier::Llm => "mock-large".to_string(),
            });
        table.register(
            tier,
            ProviderBinding { provider: "mock".to_string(), model, cost_per_1k_tokens: Decimal::ZERO },
        );
    }
    table
}

/// Run one task end to end against the in-memory mock provider and the
/// demo tool registry, using `config`'s extra rules and default budget
/// preset. Never fails on the task's own behalf — [`task_executor::execute`]
/// recovers every internal error into a [`TaskResult`] — but loading
/// `config.extra_rules_path` can fail, which this does propagate.
pub async fn run(config: &TaskEngineConfig, request: RunRequest, now_ms: u64) -> Result<TaskResult, EngineError> {
    let constitution = Constitution::with_user_rules(config.load_extra_rules()?);
    let table = provider_table(config);
    let provider = mock::MockProvider;
    let registry = mock::demo_registry();

    let deps = task_executor::ExecutorDeps {
        table: &table,
        slm: &provider,
        llm: &provider,
        registry: &registry,
        constitution: &constitution,
    };

    let budget_preset = request.budget_preset.unwrap_or(config.default_budget_preset);
    let task = Task::new(request.task_id, request.task_description, now_ms).with_budget(budget_preset);

    Ok(task_executor::execute(&deps, &task, now_ms).await)
}
