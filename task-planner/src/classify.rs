//! `classifyComplexity` — a cheap regex floor plus an SLM call, combined by
//! `max`. The floor exists so a model that underestimates risk can never
//! route an obviously tool-heavy task below the tier it actually needs.

use crate::json_parse::parse_tolerant;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use task_budget::Envelope;
use task_providers::{ModelRequest, Provider, RequestMessage, ResponseFormat, Role, Tier};

struct FloorRule {
    pattern: &'static str,
    floor: f64,
}

const FLOOR_RULES: &[FloorRule] = &[
    FloorRule { pattern: r"(?i)\b(go to|navigate to|open)\b.*\b(https?://|www\.)", floor: 0.75 },
    FloorRule { pattern: r"(?i)\b(send|compose|reply to)\b.*\b(email|message|dm)\b", floor: 0.8 },
    FloorRule { pattern: r"(?i)\b(read|write|save|download)\b.*\b(file|document|csv|pdf)\b", floor: 0.7 },
    FloorRule { pattern: r"(?i)\b(run|execute)\b.*\b(command|script|shell)\b", floor: 0.7 },
    FloorRule { pattern: r"(?i)\b(call|fetch|hit)\b.*\b(api|endpoint|url)\b", floor: 0.7 },
    FloorRule { pattern: r"(?i)\b(turn on|turn off|set)\b.*\b(thermostat|light|device|smart)\b", floor: 0.7 },
    FloorRule { pattern: r"(?i)\b(click|type|drag|scroll)\b", floor: 0.7 },
    FloorRule { pattern: r"(?i)\b(open|launch)\b.*\b(app|application|window)\b", floor: 0.75 },
    FloorRule { pattern: r"https?://\S+", floor: 0.7 },
];

fn compiled_rules() -> &'static [(Regex, f64)] {
    static COMPILED: OnceLock<Vec<(Regex, f64)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        FLOOR_RULES
            .iter()
            .filter_map(|rule| Regex::new(rule.pattern).ok().map(|re| (re, rule.floor)))
            .collect()
    })
}

/// The highest floor among all matching patterns, or `0.0` if none match.
pub fn action_floor(description: &str) -> f64 {
    compiled_rules()
        .iter()
        .filter(|(re, _)| re.is_match(description))
        .map(|(_, floor)| *floor)
        .fold(0.0, f64::max)
}

#[derive(Debug, Deserialize)]
struct ClassifierOutput {
    complexity: f64,
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
}

const CLASSIFIER_PROMPT: &str = "You are a strict task complexity classifier. \
Given a task description, respond with exactly one JSON object: \
{\"complexity\": <number 0 to 1>, \"reason\": <short string>}. \
0 means a trivial direct-answer question, 1 means a long multi-tool \
automation. Respond with nothing but the JSON object.";

/// Classify `description`'s complexity in `[0, 1]`: `max(slm_estimate, action_floor)`.
/// The SLM call going unparseable never fails classification — it only
/// forfeits the model's opinion, leaving the floor to stand alone.
pub async fn classify_complexity(
    provider: &dyn Provider,
    model: &str,
    description: &str,
    envelope: &Envelope,
) -> f64 {
    let floor = action_floor(description);
    let request = ModelRequest {
        model: model.to_string(),
        provider: String::new(),
        tier: Tier::Slm,
        system: CLASSIFIER_PROMPT.to_string(),
        messages: vec![RequestMessage { role: Role::User, content: description.to_string() }],
        response_format: ResponseFormat::Json,
        temperature: 0.0,
    };
    let slm_estimate = match provider.chat(request).await {
        Ok(response) => {
            envelope.deduct_tokens(response.token_usage.prompt_tokens, response.token_usage.completion_tokens);
            envelope.deduct_cost(response.cost_usd);
            parse_tolerant::<ClassifierOutput>(&response.content)
                .map(|out| out.complexity.clamp(0.0, 1.0))
                .unwrap_or(0.0)
        }
        Err(err) => {
            tracing::warn!(error = %err, "task.planner.classify_failed");
            0.0
        }
    };
    slm_estimate.max(floor)
}
