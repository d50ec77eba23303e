//! Parallel strategy: every agent runs concurrently against its own
//! sub-envelope, sharing one blackboard. Results keep start order regardless
//! of completion order.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use task_budget::Envelope;
use task_types::{AgentDefinition, AgentRunResult, Blackboard, BudgetPreset, EntryStatus};

use crate::agent_run::{run_agent, CrewDeps};

pub(crate) async fn run(
    deps: &CrewDeps<'_>,
    agents: &[AgentDefinition],
    task_description: &str,
    blackboard: &Arc<Mutex<Blackboard>>,
    envelopes: &HashMap<String, Envelope>,
    now_ms: u64,
) -> Vec<AgentRunResult> {
    {
        let mut bb = blackboard.lock().expect("blackboard lock poisoned");
        for agent in agents {
            bb.set_status(&agent.id, EntryStatus::Running, now_ms);
        }
    }
    let context = {
        let bb = blackboard.lock().expect("blackboard lock poisoned");
        crate::blackboard_context(&bb)
    };

    let futures = agents.iter().map(|agent| {
        let envelope = envelopes.get(&agent.id).cloned().unwrap_or_else(|| Envelope::create(BudgetPreset::Low, now_ms));
        let context = context.clone();
        async move {
            let task_result = run_agent(agent, task_description, &context, deps, &envelope, now_ms).await;
            (agent.id.clone(), task_result)
        }
    });
    let outcomes = join_all(futures).await;

    let mut bb = blackboard.lock().expect("blackboard lock poisoned");
    outcomes
        .into_iter()
        .map(|(agent_id, task_result)| {
            crate::write_agent_result(&mut bb, &agent_id, &task_result, now_ms);
            AgentRunResult { agent_id, task_result }
        })
        .collect()
}
