//! # task-tools — the tool catalogue and guarded invocation path
//!
//! [`ToolDyn`] is the object-safe trait every concrete tool implements
//! (browser driver, OS automation, HTTP, file, canvas — all out of scope
//! for this crate and supplied by the embedder). [`ToolRegistry::invoke`]
//! is the single guarded entry point: it validates the input shape, runs
//! it past the constitution's tool guard, executes, and always returns a
//! result rather than propagating a tool panic or error across the
//! boundary.

#![deny(missing_docs)]

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use task_constitution::{Constitution, ToolInvocation};
use task_types::{Severity, TaskError, Violation};
use thiserror::Error;

/// Errors raised directly by tool plumbing (not by the tool body itself,
/// which reports failure through [`ToolOutcome`]).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// Input failed the tool's declared schema.
    #[error("invalid input for {tool}: {message}")]
    InvalidInput {
        /// Tool name.
        tool: String,
        /// Why validation failed.
        message: String,
    },
}

/// The bare minimum "schema" this core enforces: a list of required
/// top-level field names, each with an expected JSON type tag. This is
/// intentionally not a full JSON Schema implementation — the tool's own
/// `execute` is free to do deeper validation.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    /// Required field name -> expected type tag (`"string"`, `"number"`,
    /// `"boolean"`, `"object"`, `"array"`).
    pub required: HashMap<String, &'static str>,
}

impl ToolSchema {
    /// An empty schema: any input object is accepted.
    pub fn any() -> Self {
        Self::default()
    }

    /// Declare a required field and its expected JSON type tag.
    pub fn require(mut self, field: impl Into<String>, type_tag: &'static str) -> Self {
        self.required.insert(field.into(), type_tag);
        self
    }

    /// Validate a plan step's `tool_args` map, without needing to build a
    /// full invocation. Used by `task-simulator` for its static pre-flight
    /// check, ahead of any real invocation.
    pub fn validate_for_simulation(
        &self,
        args: &std::collections::BTreeMap<String, Value>,
    ) -> Result<(), String> {
        let as_object = Value::Object(args.clone().into_iter().collect());
        self.validate(&as_object)
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        for (field, type_tag) in &self.required {
            let Some(value) = args.get(field) else {
                return Err(format!("missing required field `{field}`"));
            };
            let matches = match *type_tag {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !matches {
                return Err(format!("field `{field}` expected type `{type_tag}`"));
            }
        }
        Ok(())
    }
}

/// Object-safe trait every concrete tool implements.
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name, e.g. `"browser_navigate"`.
    fn name(&self) -> &str;
    /// Human-readable description, used in planner prompts.
    fn description(&self) -> &str;
    /// Input shape this tool accepts.
    fn input_schema(&self) -> ToolSchema;
    /// Tags used for filtering (e.g. `"browser"`, `"destructive"`).
    fn tags(&self) -> &[&str] {
        &[]
    }
    /// Whether this tool requires human confirmation before `execute` runs.
    /// The executor surfaces this; this crate does not enforce it.
    fn requires_confirmation(&self) -> bool {
        false
    }
    /// Execute the tool body.
    fn execute(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>>;
}

/// The outcome of a guarded invocation through [`ToolRegistry::invoke`].
/// Tool errors and constitution blocks are both captured here — this type
/// never represents an error across the call boundary itself.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Whether the tool ran and reported success.
    pub success: bool,
    /// The tool's output, when successful.
    pub output: Option<Value>,
    /// Human-readable failure reason, when unsuccessful.
    pub error: Option<String>,
    /// Wall-clock duration of the call, in milliseconds.
    pub duration_ms: u64,
}

/// Catalogue of invokable tools, immutable once a task begins executing.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool, overwriting any existing tool under the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Iterate over every registered tool.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A view of this registry restricted to `allowed` tool names, for
    /// handing a crew agent a filtered tool surface (§4.8).
    pub fn filtered(&self, allowed: &[String]) -> ToolRegistry {
        let mut filtered = ToolRegistry::new();
        for name in allowed {
            if let Some(tool) = self.tools.get(name) {
                filtered.tools.insert(name.clone(), Arc::clone(tool));
            }
        }
        filtered
    }

    /// Guarded invocation: validate input against the tool's schema, run
    /// the constitution's tool guard, execute, and capture the outcome.
    /// A critical constitution violation is the one case that still
    /// propagates as an `Err` — every other failure mode (missing tool,
    /// bad input, tool-body error) is captured in the returned
    /// [`ToolOutcome`].
    pub async fn invoke(
        &self,
        constitution: &Constitution,
        tool_name: &str,
        args: Value,
    ) -> Result<ToolOutcome, TaskError> {
        let started = Instant::now();

        let Some(tool) = self.tools.get(tool_name) else {
            return Ok(ToolOutcome {
                success: false,
                output: None,
                error: Some(ToolError::NotFound(tool_name.to_string()).to_string()),
                duration_ms: elapsed_ms(started),
            });
        };

        if let Err(message) = tool.input_schema().validate(&args) {
            return Ok(ToolOutcome {
                success: false,
                output: None,
                error: Some(
                    ToolError::InvalidInput { tool: tool_name.to_string(), message }.to_string(),
                ),
                duration_ms: elapsed_ms(started),
            });
        }

        let invocation = ToolInvocation { tool_name, args: &args };
        let violations: Vec<Violation> = match constitution.validate_tool_call(&invocation) {
            Ok(violations) => violations,
            Err(err @ TaskError::ConstitutionViolation { .. }) => {
                tracing::info!(tool = tool_name, "task.tools.blocked_by_constitution");
                return Err(err);
            }
            Err(other) => return Err(other),
        };
        for violation in &violations {
            tracing::warn!(
                tool = tool_name,
                rule_id = %violation.rule_id,
                severity = ?violation.severity,
                "task.tools.constitution_violation_recorded"
            );
            debug_assert_ne!(violation.severity, Severity::Critical);
        }

        match tool.execute(args).await {
            Ok(output) => Ok(ToolOutcome {
                success: true,
                output: Some(output),
                error: None,
                duration_ms: elapsed_ms(started),
            }),
            Err(message) => Ok(ToolOutcome {
                success: false,
                output: None,
                error: Some(message),
                duration_ms: elapsed_ms(started),
            }),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input back"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::any().require("text", "string")
        }
        fn execute(
            &self,
            input: Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
            Box::pin(async move { Ok(json!({ "echoed": input })) })
        }
    }

    struct ShellTool;

    impl ToolDyn for ShellTool {
        fn name(&self) -> &str {
            "shell_exec"
        }
        fn description(&self) -> &str {
            "Runs a shell command"
        }
        fn input_schema(&self) -> ToolSchema {
            ToolSchema::any().require("command", "string")
        }
        fn execute(
            &self,
            _input: Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send + '_>> {
            Box::pin(async move { Ok(json!({ "stdout": "" })) })
        }
    }

    #[tokio::test]
    async fn invoke_missing_tool_is_captured_not_thrown() {
        let registry = ToolRegistry::new();
        let constitution = Constitution::default();
        let outcome = registry.invoke(&constitution, "nonexistent", json!({})).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn invoke_missing_field_is_captured() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let constitution = Constitution::default();
        let outcome = registry.invoke(&constitution, "echo", json!({})).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("text"));
    }

    #[tokio::test]
    async fn invoke_succeeds_with_valid_input() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let constitution = Constitution::default();
        let outcome = registry
            .invoke(&constitution, "echo", json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.unwrap()["echoed"]["text"], "hi");
    }

    #[tokio::test]
    async fn invoke_blocks_constitution_critical_without_executing() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ShellTool));
        let constitution = Constitution::default();
        let result = registry
            .invoke(&constitution, "shell_exec", json!({"command": "rm -rf /"}))
            .await;
        assert!(matches!(result, Err(TaskError::ConstitutionViolation { .. })));
    }

    #[test]
    fn filtered_registry_drops_unlisted_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(ShellTool));
        let filtered = registry.filtered(&["echo".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.get("echo").is_some());
        assert!(filtered.get("shell_exec").is_none());
    }
}
