//! Energy/carbon accounting policy.
//!
//! The exact energy coefficient per model id is a collaborator policy, not
//! a core concern — the core only needs *some* deterministic mapping from
//! token usage to watt-hours so the energy/carbon dimensions behave like
//! the other five. [`EnergyConfig`] is that mapping; callers embedding
//! this core can swap in a more precise one.

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Token counts for one model call, as used for energy estimation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Prompt/input tokens.
    pub input_tokens: u64,
    /// Completion/output tokens.
    pub output_tokens: u64,
}

/// Per-model energy/carbon coefficients, in watt-hours and grams CO2e
/// per 1,000 tokens.
#[derive(Debug, Clone, Copy)]
pub struct EnergyCoefficient {
    /// Watt-hours consumed per 1,000 tokens processed.
    pub wh_per_1k_tokens: Decimal,
    /// Grams CO2e emitted per 1,000 tokens processed.
    pub carbon_g_per_1k_tokens: Decimal,
}

impl Default for EnergyCoefficient {
    fn default() -> Self {
        // SLM-class default: small dense models, grid-average carbon intensity.
        Self {
            wh_per_1k_tokens: Decimal::new(15, 3),       // 0.015 Wh / 1k tok
            carbon_g_per_1k_tokens: Decimal::new(8, 3),  // 0.008 g / 1k tok
        }
    }
}

/// A lookup table from model id to [`EnergyCoefficient`], with a default
/// for unknown models.
#[derive(Debug, Clone)]
pub struct EnergyConfig {
    per_model: HashMap<String, EnergyCoefficient>,
    default: EnergyCoefficient,
}

impl EnergyConfig {
    /// A config seeded with reasonable SLM/LLM coefficients, LLM-tier
    /// models costing roughly 8x an SLM per token.
    pub fn with_defaults() -> Self {
        let mut per_model = HashMap::new();
        per_model.insert(
            "llm".to_string(),
            EnergyCoefficient {
                wh_per_1k_tokens: Decimal::new(120, 3),
                carbon_g_per_1k_tokens: Decimal::new(64, 3),
            },
        );
        per_model.insert("slm".to_string(), EnergyCoefficient::default());
        Self {
            per_model,
            default: EnergyCoefficient::default(),
        }
    }

    /// Register (or overwrite) a per-model coefficient.
    pub fn set(&mut self, model_id: impl Into<String>, coefficient: EnergyCoefficient) {
        self.per_model.insert(model_id.into(), coefficient);
    }

    /// Compute `(watt_hours, carbon_grams)` for a call against `model_id`.
    pub fn estimate(&self, model_id: &str, usage: TokenUsage) -> (Decimal, Decimal) {
        let coefficient = self.per_model.get(model_id).unwrap_or(&self.default);
        let total_tokens = Decimal::from(usage.input_tokens + usage.output_tokens);
        let thousands = total_tokens / Decimal::from(1000);
        (
            thousands * coefficient.wh_per_1k_tokens,
            thousands * coefficient.carbon_g_per_1k_tokens,
        )
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}
