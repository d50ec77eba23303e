//! Per-agent sub-envelope allocation.
//!
//! `sub_envelope(share)` scales off the parent's *current remaining* budget,
//! so handing out shares one at a time would let early agents starve later
//! ones of anything beyond what's left over. [`allocate`] resolves the whole
//! roster's shares against the undivided parent first, then creates every
//! sub-envelope in ascending-share order, dividing each share by the
//! fraction of the parent not yet handed out — compensating for the fact
//! that `sub_envelope` keeps multiplying against a shrinking remainder.

use std::collections::HashMap;
use task_budget::Envelope;
use task_types::AgentDefinition;

/// Pre-allocate one sub-envelope per agent, keyed by agent id. Used by every
/// crew strategy, sequential included — sequential still allocates up front
/// so an early agent's usage can never eat into a later agent's share.
pub(crate) fn allocate(agents: &[AgentDefinition], parent: &Envelope) -> HashMap<String, Envelope> {
    let explicit_sum: f64 = agents.iter().filter_map(|a| a.budget_share).sum();
    let implicit_count = agents.iter().filter(|a| a.budget_share.is_none()).count();
    let remainder = (1.0 - explicit_sum).max(0.0);
    let implicit_share = if implicit_count > 0 { remainder / implicit_count as f64 } else { 0.0 };

    let mut shares: Vec<(String, f64)> = agents
        .iter()
        .map(|a| (a.id.clone(), a.budget_share.unwrap_or(implicit_share)))
        .collect();

    let total: f64 = shares.iter().map(|(_, s)| s).sum();
    if total > 1.0 {
        for (_, share) in &mut shares {
            *share /= total;
        }
    }

    shares.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut already_allocated = 0.0f64;
    let mut result = HashMap::with_capacity(shares.len());
    for (agent_id, share) in shares {
        let denom = 1.0 - already_allocated;
        let adjusted = if denom <= f64::EPSILON { 1.0 } else { (share / denom).clamp(0.0, 1.0) };
        result.insert(agent_id, parent.sub_envelope(adjusted));
        already_allocated += share;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;
    use task_types::{BudgetPreset, ExecutionMode};

    fn agent(id: &str, share: Option<f64>) -> AgentDefinition {
        AgentDefinition {
            id: id.to_string(),
            role: "worker".to_string(),
            instructions: "do work".to_string(),
            budget_share: share,
            execution_mode: ExecutionMode::Direct,
            max_retries: None,
            output_schema: None,
            allowed_tools: None,
        }
    }

    #[test]
    fn equal_split_when_no_shares_given() {
        let parent = Envelope::create(BudgetPreset::High, 0);
        let agents = vec![agent("a", None), agent("b", None), agent("c", None)];
        let allocated = allocate(&agents, &parent);
        let parent_tokens = parent.usage().tokens.allocated;
        for id in ["a", "b", "c"] {
            let share_tokens = allocated[id].usage().tokens.allocated;
            let ratio = (share_tokens / parent_tokens).to_f64().unwrap();
            assert!((ratio - 1.0 / 3.0).abs() < 0.01, "{id} got ratio {ratio}");
        }
    }

    #[test]
    fn explicit_shares_honoured_and_remainder_split() {
        let parent = Envelope::create(BudgetPreset::High, 0);
        let agents = vec![agent("lead", Some(0.6)), agent("helper1", None), agent("helper2", None)];
        let allocated = allocate(&agents, &parent);
        let parent_tokens = parent.usage().tokens.allocated;
        let ratio = |id: &str| -> f64 {
            (allocated[id].usage().tokens.allocated / parent_tokens).to_f64().unwrap()
        };
        assert!((ratio("lead") - 0.6).abs() < 0.01);
        assert!((ratio("helper1") - 0.2).abs() < 0.01);
        assert!((ratio("helper2") - 0.2).abs() < 0.01);
    }

    #[test]
    fn oversubscribed_shares_are_normalized_to_one() {
        let parent = Envelope::create(BudgetPreset::High, 0);
        let agents = vec![agent("a", Some(0.8)), agent("b", Some(0.8))];
        let allocated = allocate(&agents, &parent);
        let parent_tokens = parent.usage().tokens.allocated;
        let ratio = |id: &str| -> f64 {
            (allocated[id].usage().tokens.allocated / parent_tokens).to_f64().unwrap()
        };
        assert!((ratio("a") - 0.5).abs() < 0.01);
        assert!((ratio("b") - 0.5).abs() < 0.01);
    }

    #[test]
    fn sub_envelope_deductions_mirror_to_parent() {
        let parent = Envelope::create(BudgetPreset::High, 0);
        let agents = vec![agent("a", Some(0.5)), agent("b", None)];
        let allocated = allocate(&agents, &parent);
        allocated["a"].deduct_tool_call();
        allocated["b"].deduct_tool_call();
        assert_eq!(parent.usage().tool_calls.used, rust_decimal::Decimal::from(2));
    }
}
