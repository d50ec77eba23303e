//! BudgetEnvelope — the seven-dimension resource container.

use crate::energy::{EnergyConfig, TokenUsage};
use crate::presets::limits_for;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use task_types::{BudgetPreset, BudgetUsage, Dimension, DimensionUsage, EnergyTotals, TaskError};

#[derive(Debug, Clone, Copy)]
struct DimState {
    allocated: Decimal,
    used: Decimal,
}

impl DimState {
    fn remaining(&self) -> Decimal {
        (self.allocated - self.used).max(Decimal::ZERO)
    }

    /// Deduct `amount`, saturating at zero. Returns the amount actually
    /// deducted (useful for mirroring the exact delta onto a parent).
    fn deduct(&mut self, amount: Decimal) -> Decimal {
        let before = self.used;
        self.used = (self.used + amount).min(self.allocated);
        self.used - before
    }
}

#[derive(Debug)]
struct Inner {
    dims: BTreeMap<Dimension, DimState>,
    total_input_tokens: u64,
    total_output_tokens: u64,
    started_at_ms: u64,
}

impl Inner {
    fn usage(&self) -> BudgetUsage {
        let snap = |d: Dimension| {
            let s = self.dims[&d];
            DimensionUsage {
                allocated: s.allocated,
                used: s.used,
                remaining: s.remaining(),
            }
        };
        BudgetUsage {
            tokens: snap(Dimension::Tokens),
            cost_usd: snap(Dimension::CostUsd),
            latency_ms: snap(Dimension::LatencyMs),
            tool_calls: snap(Dimension::ToolCalls),
            escalations: snap(Dimension::Escalations),
            energy_wh: snap(Dimension::EnergyWh),
            carbon_grams: snap(Dimension::CarbonGrams),
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            started_at_ms: self.started_at_ms,
        }
    }
}

/// A seven-dimension resource envelope.
///
/// Cheaply cloneable (an `Arc` around the shared state) so it can be
/// handed to concurrent tasks — every deduction is atomic with respect to
/// every other deduction on the same envelope. A sub-envelope mirrors
/// every deduction onto its parent: the child's mutex is always acquired
/// and released before the parent's, so the tree of envelopes never
/// deadlocks.
#[derive(Debug, Clone)]
pub struct Envelope {
    inner: Arc<Mutex<Inner>>,
    parent: Option<Arc<Mutex<Inner>>>,
}

impl Envelope {
    /// Allocate a fresh top-level envelope for `preset`, starting now.
    pub fn create(preset: BudgetPreset, now_ms: u64) -> Self {
        let limits = limits_for(preset);
        let mut dims = BTreeMap::new();
        dims.insert(
            Dimension::Tokens,
            DimState { allocated: Decimal::from(limits.tokens), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::CostUsd,
            DimState { allocated: limits.cost_usd, used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::LatencyMs,
            DimState { allocated: Decimal::from(limits.latency_ms), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::ToolCalls,
            DimState { allocated: Decimal::from(limits.tool_calls), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::Escalations,
            DimState { allocated: Decimal::from(limits.escalations), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::EnergyWh,
            DimState { allocated: limits.energy_wh, used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::CarbonGrams,
            DimState { allocated: limits.carbon_grams, used: Decimal::ZERO },
        );

        Self {
            inner: Arc::new(Mutex::new(Inner {
                dims,
                total_input_tokens: 0,
                total_output_tokens: 0,
                started_at_ms: now_ms,
            })),
            parent: None,
        }
    }

    /// Create a fractional child envelope: `allocated = share * parent.remaining`
    /// per dimension, linked so every child deduction mirrors onto `self`.
    ///
    /// `share` is clamped to `[0, 1]` — callers that need normalization
    /// across multiple siblings (see `task-crew::allocate_budgets`) must do
    /// that before calling this.
    pub fn sub_envelope(&self, share: f64) -> Envelope {
        let share = share.clamp(0.0, 1.0);
        // Six decimal places of precision is far finer than any allocation
        // policy needs; avoids pulling in rust_decimal's float-conversion path.
        let share_decimal = Decimal::new((share * 1_000_000.0).round() as i64, 6);

        let parent_snapshot = self.inner.lock().expect("envelope mutex poisoned").usage();
        let scale = |d: DimensionUsage| d.remaining * share_decimal;

        let mut dims = BTreeMap::new();
        dims.insert(
            Dimension::Tokens,
            DimState { allocated: scale(parent_snapshot.tokens), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::CostUsd,
            DimState { allocated: scale(parent_snapshot.cost_usd), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::LatencyMs,
            DimState { allocated: scale(parent_snapshot.latency_ms), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::ToolCalls,
            DimState { allocated: scale(parent_snapshot.tool_calls), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::Escalations,
            DimState { allocated: scale(parent_snapshot.escalations), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::EnergyWh,
            DimState { allocated: scale(parent_snapshot.energy_wh), used: Decimal::ZERO },
        );
        dims.insert(
            Dimension::CarbonGrams,
            DimState { allocated: scale(parent_snapshot.carbon_grams), used: Decimal::ZERO },
        );

        Envelope {
            inner: Arc::new(Mutex::new(Inner {
                dims,
                total_input_tokens: 0,
                total_output_tokens: 0,
                started_at_ms: parent_snapshot.started_at_ms,
            })),
            parent: Some(Arc::clone(&self.inner)),
        }
    }

    /// Deduct `amount` from `dimension` on `self`, then mirror the exact
    /// amount actually deducted onto the parent (if any). Lock order is
    /// always child-then-parent.
    fn deduct(&self, dimension: Dimension, amount: Decimal) {
        let applied = {
            let mut guard = self.inner.lock().expect("envelope mutex poisoned");
            guard
                .dims
                .get_mut(&dimension)
                .expect("all seven dimensions always present")
                .deduct(amount)
        };
        if let Some(parent) = &self.parent {
            let mut guard = parent.lock().expect("parent envelope mutex poisoned");
            guard
                .dims
                .get_mut(&dimension)
                .expect("all seven dimensions always present")
                .deduct(applied);
        }
    }

    /// Deduct input/output tokens and update the running totals.
    pub fn deduct_tokens(&self, input_tokens: u64, output_tokens: u64) {
        let total = Decimal::from(input_tokens + output_tokens);
        self.deduct(Dimension::Tokens, total);
        let mut guard = self.inner.lock().expect("envelope mutex poisoned");
        guard.total_input_tokens += input_tokens;
        guard.total_output_tokens += output_tokens;
        drop(guard);
        if let Some(parent) = &self.parent {
            let mut guard = parent.lock().expect("parent envelope mutex poisoned");
            guard.total_input_tokens += input_tokens;
            guard.total_output_tokens += output_tokens;
        }
    }

    /// Deduct cost in USD.
    pub fn deduct_cost(&self, usd: Decimal) {
        self.deduct(Dimension::CostUsd, usd);
    }

    /// Deduct an elapsed wall-clock tick in milliseconds.
    pub fn deduct_latency_tick(&self, elapsed_ms: u64) {
        self.deduct(Dimension::LatencyMs, Decimal::from(elapsed_ms));
    }

    /// Deduct one tool call.
    pub fn deduct_tool_call(&self) {
        self.deduct(Dimension::ToolCalls, Decimal::ONE);
    }

    /// Deduct one escalation.
    pub fn deduct_escalation(&self) {
        self.deduct(Dimension::Escalations, Decimal::ONE);
    }

    /// Estimate and deduct energy/carbon for a model call via `cfg`.
    pub fn deduct_energy(&self, model_id: &str, usage: TokenUsage, cfg: &EnergyConfig) {
        let (wh, carbon) = cfg.estimate(model_id, usage);
        self.deduct(Dimension::EnergyWh, wh);
        self.deduct(Dimension::CarbonGrams, carbon);
    }

    /// Fail with `TaskError::BudgetExhausted` for the first exhausted
    /// dimension found, in the canonical dimension order.
    pub fn check_budget(&self) -> Result<(), TaskError> {
        let guard = self.inner.lock().expect("envelope mutex poisoned");
        for dimension in Dimension::ALL {
            if guard.dims[&dimension].remaining() <= Decimal::ZERO {
                return Err(TaskError::BudgetExhausted(dimension));
            }
        }
        Ok(())
    }

    /// Whether at least one escalation remains *and* at least 20% of both
    /// tokens and cost remain. Checked before calling a larger model.
    pub fn can_afford_escalation(&self) -> bool {
        let guard = self.inner.lock().expect("envelope mutex poisoned");
        let escalations = guard.dims[&Dimension::Escalations];
        if escalations.remaining() < Decimal::ONE {
            return false;
        }
        let fifth = Decimal::new(2, 1); // 0.2
        let tokens = guard.dims[&Dimension::Tokens];
        let cost = guard.dims[&Dimension::CostUsd];
        let enough = |d: DimState| d.allocated == Decimal::ZERO || d.remaining() / d.allocated >= fifth;
        enough(tokens) && enough(cost)
    }

    /// Snapshot every dimension's allocated/used/remaining values.
    pub fn usage(&self) -> BudgetUsage {
        self.inner.lock().expect("envelope mutex poisoned").usage()
    }

    /// Snapshot just the energy/carbon subtotal.
    pub fn energy_totals(&self) -> EnergyTotals {
        let usage = self.usage();
        EnergyTotals {
            energy_wh: usage.energy_wh.used,
            carbon_grams: usage.carbon_grams.used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;

    #[test]
    fn allocated_equals_remaining_plus_used() {
        let env = Envelope::create(BudgetPreset::Medium, 0);
        env.deduct_tokens(100, 50);
        env.deduct_cost(Decimal::new(5, 2));
        let usage = env.usage();
        for dim in [usage.tokens, usage.cost_usd, usage.latency_ms] {
            assert_eq!(dim.allocated, dim.remaining + dim.used);
        }
    }

    #[test]
    fn deduction_saturates_at_zero() {
        let env = Envelope::create(BudgetPreset::Minimal, 0);
        env.deduct_tokens(1_000_000, 0);
        let usage = env.usage();
        assert_eq!(usage.tokens.remaining, Decimal::ZERO);
        assert!(env.check_budget().is_err());
    }

    #[test]
    fn sub_envelope_mirrors_deductions_onto_parent() {
        let parent = Envelope::create(BudgetPreset::High, 0);
        let child = parent.sub_envelope(0.5);
        child.deduct_tokens(1_000, 0);
        child.deduct_cost(Decimal::new(25, 2));

        let parent_usage = parent.usage();
        let child_usage = child.usage();
        assert_eq!(parent_usage.tokens.used, child_usage.tokens.used);
        assert_eq!(parent_usage.cost_usd.used, child_usage.cost_usd.used);
    }

    #[test]
    fn can_afford_escalation_requires_headroom() {
        let env = Envelope::create(BudgetPreset::Medium, 0);
        assert!(env.can_afford_escalation());
        // Burn down tokens to below 20% remaining.
        let usage = env.usage();
        let burn = usage.tokens.allocated * Decimal::new(85, 2); // 85%
        env.deduct_tokens(burn.to_u64().unwrap_or(0), 0);
        assert!(!env.can_afford_escalation());
    }

    #[test]
    fn exhausting_escalations_blocks_affordability() {
        let env = Envelope::create(BudgetPreset::Low, 0);
        let escalations = env.usage().escalations.allocated;
        let count = escalations.to_u32().unwrap_or(0);
        for _ in 0..count {
            env.deduct_escalation();
        }
        assert!(!env.can_afford_escalation());
    }
}
