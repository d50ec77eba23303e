//! Engine configuration: the one JSON file the CLI loads before running a
//! task, grounded on the same `Config::from_path`-or-`Default` pattern the
//! rest of this stack uses for its own embedder-facing config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use task_providers::Tier;
use task_types::BudgetPreset;

use crate::error::EngineError;

/// Engine-wide configuration, loaded from an optional JSON file (default
/// `task-engine.json`) or built from [`TaskEngineConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEngineConfig {
    /// Budget preset a task gets when the caller doesn't name one.
    #[serde(default)]
    pub default_budget_preset: BudgetPreset,
    /// Model identifier -> tier it should be routed at. The mock provider
    /// and the CLI's `--task` run both use this to decide which tier a
    /// model name belongs to; a real embedder wiring a live provider would
    /// use the same map to build its own `ProviderTable`.
    #[serde(default)]
    pub models: HashMap<String, Tier>,
    /// Path to a JSON array of extra [`task_types::Rule`]s layered on top of
    /// the default constitution via `Constitution::with_user_rules`.
    #[serde(default)]
    pub extra_rules_path: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"info"` or
    /// `"task_engine=debug,task_executor=info"`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for TaskEngineConfig {
    fn default() -> Self {
        Self {
            default_budget_preset: BudgetPreset::Medium,
            models: HashMap::new(),
            extra_rules_path: None,
            log_filter: default_log_filter(),
        }
    }
}

impl TaskEngineConfig {
    /// Load from a JSON file at `path`.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| EngineError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load extra rules from `extra_rules_path`, if set. An unset path
    /// yields an empty list rather than an error.
    pub fn load_extra_rules(&self) -> Result<Vec<task_types::Rule>, EngineError> {
        let Some(path) = &self.extra_rules_path else { return Ok(Vec::new()) };
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| EngineError::Json {
            path: path.display().to_string(),
            source,
        })
    }
}
