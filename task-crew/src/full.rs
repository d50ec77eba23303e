//! Full agent execution — runs an agent through `task-executor`'s
//! eight-phase pipeline instead of the tight direct loop, for agents whose
//! work genuinely needs planning, critique, and simulation.

use task_budget::Envelope;
use task_constitution::Constitution;
use task_executor::{execute_with_envelope, ExecutorDeps};
use task_providers::Provider;
use task_router::ProviderTable;
use task_tools::ToolRegistry;
use task_types::{AgentDefinition, ChatMessage, ChatRole, Task, TaskResult};

/// Run `agent` through the full task executor against `envelope`. The
/// agent's instructions are folded into the task description the planner
/// sees (the planner/synthesizer in `task-executor` take a flat description
/// string, not a per-call system-prompt override) and also carried as a
/// leading system chat message, which the synthesis phase does read.
pub(crate) async fn run(
    agent: &AgentDefinition,
    task_description: &str,
    blackboard_context: &str,
    table: &ProviderTable,
    slm: &dyn Provider,
    llm: &dyn Provider,
    registry: &ToolRegistry,
    constitution: &Constitution,
    envelope: &Envelope,
    now_ms: u64,
) -> TaskResult {
    let deps = ExecutorDeps { table, slm, llm, registry, constitution };

    let mut description = format!("As the \"{}\" agent: {}\n\nTask: {}", agent.role, agent.instructions, task_description);
    if !blackboard_context.is_empty() {
        description.push_str(&format!("\n\nShared context from other agents:\n{blackboard_context}"));
    }

    let mut task = Task::new(agent.id.clone(), description, now_ms);
    task.messages.push(ChatMessage {
        role: ChatRole::System,
        content: format!("You are the \"{}\" agent in a multi-agent crew. {}", agent.role, agent.instructions),
    });

    execute_with_envelope(&deps, &task, envelope, now_ms).await
}
