//! `plan`'s last-resort heuristic fallback: both the SLM and LLM calls
//! failed, so synthesize a plan from intent pattern-matching instead of
//! giving up entirely. Only returned when at least one step could be
//! produced and its tool actually exists in the registry.

use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use task_tools::ToolRegistry;
use task_types::PlanStep;

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

fn mentions(description: &str, words: &[&str]) -> bool {
    let lower = description.to_lowercase();
    words.iter().all(|w| lower.contains(w))
}

/// Synthesize a canned step sequence from `description`, keeping only steps
/// whose tool is present in `registry`. Returns `None` if no pattern
/// matched, or every matched step's tool is missing.
pub fn heuristic_fallback(description: &str, registry: &ToolRegistry) -> Option<Vec<PlanStep>> {
    let candidates = if let Some(url) = url_pattern().find(description) {
        vec![step("navigate", "browser_navigate", [("url", json!(url.as_str()))])]
    } else if mentions(description, &["youtube", "play"]) {
        vec![
            step("open youtube", "browser_navigate", [("url", json!("https://youtube.com"))]),
            step("search", "browser_type", [("selector", json!("input#search")), ("text", json!(description))]),
            step("run search", "browser_click", [("selector", json!("button#search-icon-legacy"))]),
        ]
    } else if mentions(description, &["google", "search"]) {
        vec![
            step("open google", "browser_navigate", [("url", json!("https://google.com"))]),
            step("enter query", "browser_type", [("selector", json!("textarea[name=q]")), ("text", json!(description))]),
            step("submit", "browser_click", [("selector", json!("input[type=submit]"))]),
        ]
    } else if mentions(description, &["gmail", "compose"]) || mentions(description, &["email", "send"]) {
        vec![
            step("open gmail", "browser_navigate", [("url", json!("https://mail.google.com"))]),
            step("compose", "browser_click", [("selector", json!("div[gh=cm]"))]),
            step("write body", "browser_type", [("selector", json!("div[aria-label=\"Message Body\"]")), ("text", json!(description))]),
        ]
    } else {
        return None;
    };

    let available: Vec<PlanStep> = candidates
        .into_iter()
        .filter(|step| registry.get(&step.tool_name).is_some())
        .enumerate()
        .map(|(i, mut step)| {
            step.index = i;
            step
        })
        .collect();

    if available.is_empty() {
        None
    } else {
        Some(available)
    }
}

fn step<const N: usize>(
    description: &str,
    tool_name: &str,
    args: [(&str, serde_json::Value); N],
) -> PlanStep {
    let tool_args: BTreeMap<String, serde_json::Value> =
        args.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    PlanStep::new(0, description, tool_name, tool_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use task_tools::{ToolDyn, ToolSchema};

    struct StubTool(&'static str);
    impl ToolDyn for StubTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::any()
        }
        fn execute(
            &self,
            input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send + '_>> {
            Box::pin(async move { Ok(input) })
        }
    }

    fn registry_with(names: &[&'static str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry.register(Arc::new(StubTool(name)));
        }
        registry
    }

    #[test]
    fn url_in_description_produces_a_single_navigate_step() {
        let registry = registry_with(&["browser_navigate"]);
        let steps = heuristic_fallback("open https://example.com please", &registry).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool_name, "browser_navigate");
    }

    #[test]
    fn missing_tools_are_filtered_and_may_empty_the_plan() {
        let registry = registry_with(&[]);
        assert!(heuristic_fallback("open https://example.com please", &registry).is_none());
    }

    #[test]
    fn no_matching_pattern_returns_none() {
        let registry = registry_with(&["browser_navigate"]);
        assert!(heuristic_fallback("what's the weather like", &registry).is_none());
    }

    #[test]
    fn gmail_compose_keeps_only_available_steps() {
        let registry = registry_with(&["browser_navigate", "browser_click"]);
        let steps = heuristic_fallback("compose a gmail email to my boss", &registry).unwrap();
        assert!(steps.iter().all(|s| s.tool_name != "browser_type"));
        assert_eq!(steps.len(), 2);
    }
}
