//! Concrete preset limits.
//!
//! Only the relative ordering is fixed,
//! `minimal < low < medium < high < maximum` across all seven dimensions —
//! the concrete numbers are a calibration choice, recorded here and in
//! `DESIGN.md`. Each step roughly triples the previous one except for
//! `escalations`, which grows more slowly since every escalation is an
//! expensive LLM-tier call.

use rust_decimal::Decimal;
use task_types::BudgetPreset;

/// Concrete allocation for all seven dimensions.
#[derive(Debug, Clone, Copy)]
pub struct PresetLimits {
    /// Token budget (input + output).
    pub tokens: u64,
    /// Cost budget in USD.
    pub cost_usd: Decimal,
    /// Wall-clock latency budget in milliseconds.
    pub latency_ms: u64,
    /// Tool-call budget.
    pub tool_calls: u64,
    /// Escalation budget (SLM -> LLM tier switches).
    pub escalations: u64,
    /// Energy budget in watt-hours.
    pub energy_wh: Decimal,
    /// Carbon budget in grams CO2e.
    pub carbon_grams: Decimal,
}

/// Resolve a preset name into concrete limits.
pub fn limits_for(preset: BudgetPreset) -> PresetLimits {
    match preset {
        BudgetPreset::Minimal => PresetLimits {
            tokens: 4_000,
            cost_usd: Decimal::new(10, 2),    // $0.10
            latency_ms: 15_000,
            tool_calls: 2,
            escalations: 0,
            energy_wh: Decimal::new(2, 1),    // 0.2 Wh
            carbon_grams: Decimal::new(1, 1), // 0.1 g
        },
        BudgetPreset::Low => PresetLimits {
            tokens: 15_000,
            cost_usd: Decimal::new(50, 2), // $0.50
            latency_ms: 45_000,
            tool_calls: 6,
            escalations: 1,
            energy_wh: Decimal::new(8, 1),
            carbon_grams: Decimal::new(4, 1),
        },
        BudgetPreset::Medium => PresetLimits {
            tokens: 50_000,
            cost_usd: Decimal::new(200, 2), // $2.00
            latency_ms: 120_000,
            tool_calls: 20,
            escalations: 3,
            energy_wh: Decimal::new(30, 1),
            carbon_grams: Decimal::new(15, 1),
        },
        BudgetPreset::High => PresetLimits {
            tokens: 150_000,
            cost_usd: Decimal::new(800, 2), // $8.00
            latency_ms: 360_000,
            tool_calls: 60,
            escalations: 8,
            energy_wh: Decimal::new(100, 1),
            carbon_grams: Decimal::new(50, 1),
        },
        BudgetPreset::Maximum => PresetLimits {
            tokens: 500_000,
            cost_usd: Decimal::new(3000, 2), // $30.00
            latency_ms: 1_200_000,
            tool_calls: 200,
            escalations: 20,
            energy_wh: Decimal::new(350, 1),
            carbon_grams: Decimal::new(175, 1),
        },
    }
}
