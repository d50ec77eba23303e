//! Success criteria evaluation, run once synthesis has produced final text.

use serde_json::Value;
use task_types::{CriterionResult, CriterionType, StepResult, SuccessCriterion};

/// Evaluate every criterion against the step results and synthesized text,
/// in declaration order.
pub(crate) fn evaluate(criteria: &[SuccessCriterion], steps: &[StepResult], synthesized: &str) -> Vec<CriterionResult> {
    criteria.iter().map(|criterion| evaluate_one(criterion, steps, synthesized)).collect()
}

fn check_str<'a>(check: &'a Value, field: &str) -> Option<&'a str> {
    check.get(field).and_then(Value::as_str)
}

fn evaluate_one(criterion: &SuccessCriterion, steps: &[StepResult], synthesized: &str) -> CriterionResult {
    let met = match criterion.kind {
        CriterionType::OutputContains => {
            let needle = check_str(&criterion.check, "text")
                .or_else(|| check_str(&criterion.check, "pattern"))
                .unwrap_or_default();
            crate::text_match::matches(needle, synthesized)
        }
        CriterionType::ToolSucceeded => match check_str(&criterion.check, "tool") {
            Some(tool) => steps.iter().any(|s| s.success && s.tool_name == tool),
            None => steps.iter().any(|s| s.success),
        },
        CriterionType::PageState => {
            let url = check_str(&criterion.check, "url");
            let title = check_str(&criterion.check, "title");
            steps
                .iter()
                .filter(|s| s.success && s.tool_name.starts_with("browser_"))
                .any(|s| {
                    let text = s.output.to_string();
                    url.map(|needle| crate::text_match::matches(needle, &text)).unwrap_or(false)
                        || title.map(|needle| crate::text_match::matches(needle, &text)).unwrap_or(false)
                })
        }
        CriterionType::FileExists => {
            let path = check_str(&criterion.check, "path");
            steps.iter().any(|s| {
                s.success
                    && matches!(s.tool_name.as_str(), "file_write" | "file_read")
                    && path.map(|expected| s.tool_args.get("path").and_then(Value::as_str) == Some(expected)).unwrap_or(true)
            })
        }
        CriterionType::Custom => steps.iter().any(|s| s.success),
    };
    let explanation = if met {
        format!("criterion satisfied: {}", criterion.description)
    } else {
        format!("criterion not satisfied: {}", criterion.description)
    };
    CriterionResult { description: criterion.description.clone(), met, explanation }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use task_types::DurationMs;

    fn criterion(kind: CriterionType, check: Value) -> SuccessCriterion {
        SuccessCriterion { description: "test".to_string(), kind, check }
    }

    #[test]
    fn output_contains_matches_synthesized_text() {
        let result = evaluate_one(&criterion(CriterionType::OutputContains, json!({"text": "booked"})), &[], "Your flight is booked.");
        assert!(result.met);
    }

    #[test]
    fn tool_succeeded_checks_named_tool() {
        let steps = vec![StepResult::success(0, "browser_navigate", BTreeMap::new(), Value::Null, DurationMs::ZERO)];
        let result = evaluate_one(&criterion(CriterionType::ToolSucceeded, json!({"tool": "browser_navigate"})), &steps, "");
        assert!(result.met);
    }

    #[test]
    fn tool_succeeded_without_tool_name_checks_any_success() {
        let steps = vec![StepResult::failure(0, "x", BTreeMap::new(), "err", DurationMs::ZERO)];
        let result = evaluate_one(&criterion(CriterionType::ToolSucceeded, json!({})), &steps, "");
        assert!(!result.met);
    }

    #[test]
    fn file_exists_matches_path_in_args() {
        let mut args = BTreeMap::new();
        args.insert("path".to_string(), json!("/tmp/out.csv"));
        let steps = vec![StepResult::success(0, "file_write", args, Value::Null, DurationMs::ZERO)];
        let result = evaluate_one(&criterion(CriterionType::FileExists, json!({"path": "/tmp/out.csv"})), &steps, "");
        assert!(result.met);
    }

    #[test]
    fn custom_is_optimistic_on_any_success() {
        let steps = vec![StepResult::success(0, "x", BTreeMap::new(), Value::Null, DurationMs::ZERO)];
        let result = evaluate_one(&criterion(CriterionType::Custom, json!({})), &steps, "");
        assert!(result.met);
    }
}
