//! Post-step verification (`verify` phase).

use serde_json::Value;
use std::collections::BTreeMap;
use task_constitution::Constitution;
use task_tools::ToolRegistry;
use task_types::{TaskError, VerifySpec, VerifyType};

/// Run a step's verification against its own output (and, for `dom_check`,
/// against the live page via `browser_evaluate` when that tool exists).
pub(crate) async fn verify_step(
    registry: &ToolRegistry,
    constitution: &Constitution,
    verify: &VerifySpec,
    output: &Value,
) -> Result<bool, TaskError> {
    match verify.kind {
        VerifyType::None => Ok(true),
        VerifyType::OutputCheck => Ok(matches_assertion(&verify.assertion, output)),
        VerifyType::DomCheck => {
            if registry.get("browser_evaluate").is_some() {
                let mut args = BTreeMap::new();
                args.insert("script".to_string(), Value::String(verify.assertion.clone()));
                let outcome = registry
                    .invoke(constitution, "browser_evaluate", Value::Object(args.into_iter().collect()))
                    .await?;
                Ok(outcome.success && outcome.output.as_ref().map(truthy).unwrap_or(false))
            } else {
                Ok(matches_assertion(&verify.assertion, output))
            }
        }
    }
}

fn matches_assertion(assertion: &str, output: &Value) -> bool {
    let text = match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    crate::text_match::matches(assertion, &text)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s.to_lowercase() != "false",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
