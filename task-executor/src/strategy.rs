//! Automation strategy selection (simulate phase) and strategy-fallback
//! step synthesis (act phase, on failure).

use serde_json::Value;
use std::collections::BTreeMap;
use task_types::{PlanStep, StrategyKind, StrategySpec};

const VISION_HINTS: &[&str] = &["screenshot", "visual", "appearance"];
const API_HINTS: &[&str] = &["api", "rest", "endpoint", "fetch"];

/// Only `browser_*` and `http_fetch` steps carry a strategy annotation.
/// Everything else comes back `None` and is left untouched.
pub(crate) fn select(description: &str, tool_name: &str) -> Option<StrategySpec> {
    if !(tool_name.starts_with("browser_") || tool_name == "http_fetch") {
        return None;
    }
    let lower = description.to_lowercase();
    let (primary, reason) = if VISION_HINTS.iter().any(|hint| lower.contains(hint)) {
        (StrategyKind::Vision, "description mentions visual/screenshot intent")
    } else if tool_name == "http_fetch" || API_HINTS.iter().any(|hint| lower.contains(hint)) {
        (StrategyKind::Api, "description mentions api/rest/endpoint intent, or tool is http_fetch")
    } else {
        (StrategyKind::Dom, "default DOM automation")
    };
    let fallback_chain = match primary {
        StrategyKind::Dom => Vec::new(),
        StrategyKind::Vision | StrategyKind::Api => vec![StrategyKind::Dom],
    };
    Some(StrategySpec { primary, fallback_chain, reason: reason.to_string() })
}

/// When a step with a strategy fails, build the fallback steps for its
/// primary strategy rather than escalating into a full replan. `Dom` has
/// nowhere left to fall back to.
pub(crate) fn fallback_steps(failed: &PlanStep, next_index: usize) -> Option<Vec<PlanStep>> {
    let strategy = failed.strategy.as_ref()?;
    match strategy.primary {
        StrategyKind::Vision => {
            let mut click_args = BTreeMap::new();
            click_args.insert("action".to_string(), Value::String("click_at_coords".to_string()));
            Some(vec![
                PlanStep::new(next_index, "capture a screenshot for visual fallback", "browser_screenshot", BTreeMap::new()),
                PlanStep::new(next_index + 1, "click at the last observed coordinates", "os_mouse", click_args),
            ])
        }
        StrategyKind::Api => {
            let mut args = BTreeMap::new();
            if let Some(url) = failed.tool_args.get("url") {
                args.insert("url".to_string(), url.clone());
            }
            Some(vec![PlanStep::new(next_index, "retry via direct API fetch", "http_fetch", args)])
        }
        StrategyKind::Dom => None,
    }
}

/// Display name recorded on the `StrategySelected` trace event.
pub(crate) fn name(kind: StrategyKind) -> &'static str {
    match kind {
        StrategyKind::Dom => "dom",
        StrategyKind::Vision => "vision",
        StrategyKind::Api => "api",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_browser_tools_get_no_strategy() {
        assert!(select("take a screenshot", "file_write").is_none());
    }

    #[test]
    fn screenshot_intent_selects_vision() {
        let spec = select("take a screenshot of the page", "browser_click").unwrap();
        assert_eq!(spec.primary, StrategyKind::Vision);
    }

    #[test]
    fn http_fetch_always_selects_api() {
        let spec = select("grab the page", "http_fetch").unwrap();
        assert_eq!(spec.primary, StrategyKind::Api);
    }

    #[test]
    fn default_is_dom() {
        let spec = select("click the login button", "browser_click").unwrap();
        assert_eq!(spec.primary, StrategyKind::Dom);
    }

    #[test]
    fn dom_strategy_has_no_fallback_steps() {
        let mut step = PlanStep::new(0, "click", "browser_click", BTreeMap::new());
        step.strategy = select("click the button", "browser_click");
        assert!(fallback_steps(&step, 1).is_none());
    }

    #[test]
    fn api_fallback_carries_url_forward() {
        let mut args = BTreeMap::new();
        args.insert("url".to_string(), Value::String("https://example.com".to_string()));
        let mut step = PlanStep::new(0, "fetch via API", "http_fetch", args);
        step.strategy = select("fetch the api", "http_fetch");
        let steps = fallback_steps(&step, 1).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool_args.get("url").unwrap(), "https://example.com");
    }
}
