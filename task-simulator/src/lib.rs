//! # task-simulator — static pre-flight validation of a plan
//!
//! `simulate` is a pure function of `(plan, registry)`: no tool executes,
//! no model is called, no budget is touched. It exists to catch obviously
//! broken plans (missing tools, malformed args, dangling forward
//! references, high-risk actions) before the executor commits real
//! resources to them.

#![deny(missing_docs)]

use rust_decimal::Decimal;
use task_tools::ToolRegistry;
use task_types::{ExecutionPlan, IssueSeverity, IssueType, SimulationIssue, SimulationResult};

const BROWSER_ACTION_TOOLS: &[&str] = &[
    "browser_click",
    "browser_type",
    "browser_evaluate",
    "browser_observe",
];

/// Static risk classification for known tool names. Tools not listed carry
/// no inherent `high_risk` issue.
fn risk_severity(tool_name: &str) -> Option<IssueSeverity> {
    match tool_name {
        "file_write" | "os_keyboard" | "os_mouse" | "browser_evaluate" => {
            Some(IssueSeverity::Medium)
        }
        "browser_click" | "browser_type" | "clipboard_write" | "http_fetch" => {
            Some(IssueSeverity::Low)
        }
        _ => None,
    }
}

fn references_forward_output(value: &serde_json::Value, current_index: usize) -> bool {
    match value {
        serde_json::Value::String(s) => {
            if let Some(rest) = s.strip_prefix("$output_") {
                if let Ok(n) = rest.parse::<usize>() {
                    return n >= current_index;
                }
            }
            false
        }
        serde_json::Value::Object(map) => {
            map.values().any(|v| references_forward_output(v, current_index))
        }
        serde_json::Value::Array(items) => {
            items.iter().any(|v| references_forward_output(v, current_index))
        }
        _ => false,
    }
}

/// Run every static check against `plan`. Never mutates the plan or the
/// registry, never calls a tool or a model.
pub fn simulate(plan: &ExecutionPlan, registry: &ToolRegistry) -> SimulationResult {
    let mut issues = Vec::new();
    let mut navigated = false;
    let mut estimated_cost = Decimal::ZERO;

    for step in &plan.steps {
        let Some(tool) = registry.get(&step.tool_name) else {
            issues.push(SimulationIssue {
                step_index: step.index,
                kind: IssueType::MissingTool,
                severity: IssueSeverity::High,
                message: format!("tool `{}` is not registered", step.tool_name),
            });
            continue;
        };

        if let Err(message) = tool.input_schema().validate_for_simulation(&step.tool_args) {
            issues.push(SimulationIssue {
                step_index: step.index,
                kind: IssueType::InvalidArgs,
                severity: IssueSeverity::High,
                message,
            });
        }

        if step.tool_name == "browser_navigate" {
            navigated = true;
        } else if BROWSER_ACTION_TOOLS.contains(&step.tool_name.as_str()) && !navigated {
            issues.push(SimulationIssue {
                step_index: step.index,
                kind: IssueType::MissingDependency,
                severity: IssueSeverity::Medium,
                message: format!(
                    "`{}` has no preceding `browser_navigate`",
                    step.tool_name
                ),
            });
        }

        for value in step.tool_args.values() {
            if references_forward_output(value, step.index) {
                issues.push(SimulationIssue {
                    step_index: step.index,
                    kind: IssueType::MissingDependency,
                    severity: IssueSeverity::High,
                    message: format!(
                        "references an output that does not exist yet at step {}",
                        step.index
                    ),
                });
                break;
            }
        }

        if let Some(severity) = risk_severity(&step.tool_name) {
            issues.push(SimulationIssue {
                step_index: step.index,
                kind: IssueType::HighRisk,
                severity,
                message: format!("`{}` is a {:?}-risk action", step.tool_name, severity),
            });
        }

        estimated_cost += Decimal::new(5, 3); // flat per-tool-call estimate, refined by the router at act time
    }

    let valid = !issues.iter().any(|issue| issue.severity == IssueSeverity::High);

    SimulationResult { valid, issues, estimated_cost }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use task_tools::{ToolDyn, ToolSchema};
    use task_types::PlanStep;

    struct StubTool {
        name: &'static str,
    }

    impl ToolDyn for StubTool {
        fn name(&self) -> &str {
            self.name
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
            registry.register(Arc::new(StubTool { name }));
        }
        registry
    }

    #[test]
    fn missing_tool_is_high_severity() {
        let plan = ExecutionPlan {
            task_id: "t1".to_string(),
            complexity: 0.5,
            steps: vec![PlanStep::new(0, "do it", "not_registered", BTreeMap::new())],
        };
        let result = simulate(&plan, &registry_with(&[]));
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueType::MissingTool);
    }

    #[test]
    fn browser_action_without_navigate_is_medium() {
        let plan = ExecutionPlan {
            task_id: "t1".to_string(),
            complexity: 0.5,
            steps: vec![PlanStep::new(0, "click", "browser_click", BTreeMap::new())],
        };
        let result = simulate(&plan, &registry_with(&["browser_click"]));
        assert!(result.valid);
        assert_eq!(result.issues[0].severity, IssueSeverity::Medium);
    }

    #[test]
    fn forward_reference_is_high_severity() {
        let mut args = BTreeMap::new();
        args.insert("url".to_string(), json!("$output_3"));
        let plan = ExecutionPlan {
            task_id: "t1".to_string(),
            complexity: 0.5,
            steps: vec![PlanStep::new(1, "navigate", "browser_navigate", args)],
        };
        let result = simulate(&plan, &registry_with(&["browser_navigate"]));
        assert!(!result.valid);
        assert!(result
            .issues
            .iter()
            .any(|issue| issue.kind == IssueType::MissingDependency && issue.severity == IssueSeverity::High));
    }

    #[test]
    fn simulating_twice_is_idempotent() {
        let plan = ExecutionPlan {
            task_id: "t1".to_string(),
            complexity: 0.5,
            steps: vec![PlanStep::new(0, "write", "file_write", BTreeMap::new())],
        };
        let registry = registry_with(&["file_write"]);
        let first = simulate(&plan, &registry);
        let second = simulate(&plan, &registry);
        assert_eq!(first.valid, second.valid);
        assert_eq!(first.issues.len(), second.issues.len());
    }
}
