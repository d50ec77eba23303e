//! # task-router — chooses (provider, model, tier) per operation
//!
//! The router has no model of its own provider pool; it consumes a small
//! `ProviderTable` mapping (tier -> (provider, model) name pair) supplied
//! by the embedder, and decides only the *tier* plus whether an escalation
//! is affordable. Concrete provider selection within a tier is the
//! embedder's business.

#![deny(missing_docs)]

use rust_decimal::Decimal;
use std::collections::HashMap;
use task_budget::Envelope;
use task_providers::Tier;

/// The kind of model call being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `classifyComplexity`.
    Classify,
    /// `plan`.
    Plan,
    /// `synthesize`.
    Synthesize,
}

/// A (provider, model) pair registered for one tier.
#[derive(Debug, Clone)]
pub struct ProviderBinding {
    /// Provider name, e.g. `"anthropic"`.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Rough cost per 1,000 tokens, for the router's cost estimate.
    pub cost_per_1k_tokens: Decimal,
}

/// The embedder-supplied table of which (provider, model) serves each tier.
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    bindings: HashMap<Tier, ProviderBinding>,
}

impl ProviderTable {
    /// An empty table; callers must `register` both tiers before routing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the (provider, model) binding for a tier.
    pub fn register(&mut self, tier: Tier, binding: ProviderBinding) {
        self.bindings.insert(tier, binding);
    }

    fn get(&self, tier: Tier) -> Option<&ProviderBinding> {
        self.bindings.get(&tier)
    }
}

/// The router's decision for one model call.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Chosen provider.
    pub provider: String,
    /// Chosen model.
    pub model: String,
    /// Chosen tier.
    pub tier: Tier,
    /// Rough cost estimate in USD, informational only.
    pub estimated_cost: Decimal,
    /// Why this tier was chosen, for trace logging.
    pub reason: String,
}

fn decision_for(table: &ProviderTable, tier: Tier, reason: impl Into<String>) -> RoutingDecision {
    let binding = table
        .get(tier)
        .cloned()
        .unwrap_or(ProviderBinding {
            provider: "unconfigured".to_string(),
            model: "unconfigured".to_string(),
            cost_per_1k_tokens: Decimal::ZERO,
        });
    RoutingDecision {
        provider: binding.provider,
        model: binding.model,
        tier,
        estimated_cost: binding.cost_per_1k_tokens,
        reason: reason.into(),
    }
}

/// Route a model call for `operation` given the task's `complexity` (in
/// `[0, 1]`) and remaining budget in `envelope`.
pub fn route(table: &ProviderTable, operation: Operation, complexity: f64, envelope: &Envelope) -> RoutingDecision {
    let usage = envelope.usage();
    let cost_fraction = if usage.cost_usd.allocated.is_zero() {
        Decimal::ONE
    } else {
        usage.cost_usd.remaining / usage.cost_usd.allocated
    };
    let token_fraction = if usage.tokens.allocated.is_zero() {
        Decimal::ONE
    } else {
        usage.tokens.remaining / usage.tokens.allocated
    };

    match operation {
        Operation::Classify => decision_for(table, Tier::Slm, "classification is always SLM"),
        Operation::Plan => {
            if complexity < 0.6 {
                decision_for(table, Tier::Slm, "complexity below 0.6")
            } else if cost_fraction < Decimal::new(40, 2) || token_fraction < Decimal::new(30, 2) {
                decision_for(
                    table,
                    Tier::Slm,
                    "complexity warrants LLM but budget headroom is low, downgraded",
                )
            } else {
                decision_for(table, Tier::Llm, "complexity at or above 0.6")
            }
        }
        Operation::Synthesize => {
            if complexity >= 0.6 {
                decision_for(table, Tier::Llm, "complexity at or above 0.6")
            } else {
                decision_for(table, Tier::Slm, "short direct answer")
            }
        }
    }
}

/// Route a synthesis call that must account for step failures: an LLM is
/// used whenever any step failed, regardless of complexity.
pub fn route_synthesize(
    table: &ProviderTable,
    complexity: f64,
    any_step_failed: bool,
    envelope: &Envelope,
) -> RoutingDecision {
    if any_step_failed {
        let mut decision = decision_for(table, Tier::Llm, "at least one step failed");
        let _ = envelope;
        decision.reason = "at least one step failed".to_string();
        decision
    } else {
        route(table, Operation::Synthesize, complexity, envelope)
    }
}

/// Force the LLM tier and consume one escalation. Callers must have
/// already checked `envelope.can_afford_escalation()`.
pub fn escalate(table: &ProviderTable, envelope: &Envelope, reason: impl Into<String>) -> RoutingDecision {
    envelope.deduct_escalation();
    decision_for(table, Tier::Llm, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_types::BudgetPreset;

    fn table() -> ProviderTable {
        let mut table = ProviderTable::new();
        table.register(
            Tier::Slm,
            ProviderBinding {
                provider: "ollama".to_string(),
                model: "small".to_string(),
                cost_per_1k_tokens: Decimal::new(1, 3),
            },
        );
        table.register(
            Tier::Llm,
            ProviderBinding {
                provider: "anthropic".to_string(),
                model: "big".to_string(),
                cost_per_1k_tokens: Decimal::new(15, 3),
            },
        );
        table
    }

    #[test]
    fn classify_is_always_slm() {
        let env = Envelope::create(BudgetPreset::Medium, 0);
        let decision = route(&table(), Operation::Classify, 0.9, &env);
        assert_eq!(decision.tier, Tier::Slm);
    }

    #[test]
    fn plan_escalates_to_llm_above_threshold() {
        let env = Envelope::create(BudgetPreset::Medium, 0);
        let decision = route(&table(), Operation::Plan, 0.8, &env);
        assert_eq!(decision.tier, Tier::Llm);
    }

    #[test]
    fn plan_downgrades_when_budget_low() {
        let env = Envelope::create(BudgetPreset::Medium, 0);
        let usage = env.usage();
        env.deduct_cost(usage.cost_usd.allocated * Decimal::new(70, 2));
        let decision = route(&table(), Operation::Plan, 0.8, &env);
        assert_eq!(decision.tier, Tier::Slm);
    }

    #[test]
    fn escalate_consumes_one_escalation() {
        let env = Envelope::create(BudgetPreset::Medium, 0);
        let before = env.usage().escalations.used;
        let decision = escalate(&table(), &env, "parse failure");
        assert_eq!(decision.tier, Tier::Llm);
        assert_eq!(env.usage().escalations.used, before + Decimal::ONE);
    }
}
